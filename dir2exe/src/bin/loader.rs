use std::env;
use std::ffi::OsString;
use std::process;

use dir2exe::{run_self_extracting, LoaderConfig};
use log::error;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    eprintln!("booting.... please wait");

    let self_path = match env::current_exe() {
        Ok(path) => path,
        Err(err) => {
            error!("Could not locate own executable: {}", err);
            process::exit(1);
        }
    };
    let args: Vec<OsString> = env::args_os().collect();

    process::exit(run_self_extracting(&self_path, &args, &LoaderConfig::from_env()));
}
