pub mod change_detector;
pub mod morphology;
pub mod preprocess;
pub mod ratio_history;
