mod test_helpers;

mod degree_days_tests;
mod drivers_tests;
mod load_shapes_tests;
mod smoothing_tests;
