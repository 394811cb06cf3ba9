mod property_partition;
mod unicode;
pub(crate) mod utils;
