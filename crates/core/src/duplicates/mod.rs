//! Duplicate detection and merge.

mod duplicates_model;
mod duplicates_service;
mod duplicates_traits;


pub use duplicates_model::{
    choose_survivor, group_duplicates, AutoMergeSummary, DuplicateGroup, DuplicateKey,
    MergeResult,
};
pub use duplicates_service::DuplicateService;
pub use duplicates_traits::{AccountMergeStoreTrait, DuplicateServiceTrait};
