pub mod entitlement_repo;
pub mod regenerate_session_repo;
pub mod thumbnail_repo;

pub use entitlement_repo::EntitlementRepo;
pub use regenerate_session_repo::RegenerateSessionRepo;
pub use thumbnail_repo::ThumbnailRepo;
