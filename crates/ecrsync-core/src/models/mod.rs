mod repository;
mod tag;

pub use repository::{
    Condition, EncryptionConfiguration, ImageScanningConfiguration, ImageTagMutability,
    Repository, RepositorySpec, RepositoryStatus,
};
pub use tag::Tag;
