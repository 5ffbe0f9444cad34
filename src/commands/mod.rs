pub(crate) mod build;
pub(crate) mod list;
pub(crate) mod shutdown;
