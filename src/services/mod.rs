pub mod processor;
pub mod queue;
pub mod storage;
pub mod worker;
