use log::error;
use rfb_sim::demos::cycling_demos;
use simplelog::{ColorChoice, Config, LevelFilter, SimpleLogger, TermLogger, TerminalMode};

pub fn main() {
    if TermLogger::init(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .is_err()
    {
        let _ = SimpleLogger::init(LevelFilter::Info, Config::default());
    }
    let task: usize = 0;
    if let Err(e) = cycling_demos(task) {
        error!("demo {} failed: {}", task, e);
    }
}
