pub mod test_duplicate_join;
