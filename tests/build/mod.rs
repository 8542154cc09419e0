mod tests_incremental;
mod tests_multi_release;
mod tests_parallel;
mod tests_state_recovery;
