pub mod processor_sync;
