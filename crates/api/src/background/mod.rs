pub mod timeout_sweep;
