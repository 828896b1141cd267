pub mod dock;
pub mod notify;
