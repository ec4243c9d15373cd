pub mod sequence;
pub mod verdict;
