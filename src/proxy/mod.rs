pub mod cache;
pub mod dispatcher;
pub mod job;
pub mod upstream;
pub mod worker;
