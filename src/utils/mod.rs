pub mod file_walking;
pub mod process;
#[cfg(test)]
pub mod test_utils;
