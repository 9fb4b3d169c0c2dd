pub mod room;
pub mod slot;
pub mod speaker;
pub mod talk;
pub mod utility;
pub mod workshop;

#[cfg(test)]
pub(crate) mod test_utils;
