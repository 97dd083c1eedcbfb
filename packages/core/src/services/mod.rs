pub mod myturn;
pub mod retry;
