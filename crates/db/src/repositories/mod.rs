pub mod job_repo;
pub mod user_repo;

pub use job_repo::JobRepo;
pub use user_repo::UserRepo;
