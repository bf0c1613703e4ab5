pub mod frame_sinks;
pub mod monitor_feed_use_case;
