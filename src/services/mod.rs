pub mod catalog;
pub mod collector;
pub mod curation;
pub mod image_store;
pub mod preferences;
pub mod providers;
pub mod recommendation;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;
