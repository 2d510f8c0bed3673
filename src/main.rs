use std::env;
use std::process::exit;
use std::sync::Arc;
use std::time::Instant;

use blinkdb::config::{default_config_with_warning, Config};
use blinkdb::keyspace::Store;
use blinkdb::log::{self, LogLevel};
use blinkdb::{net, persist};

fn main() {
    let args: Vec<String> = env::args().collect();

    let cfg = if args.len() == 2 {
        Config::load_from_file(&args[1])
    } else if args.len() > 2 {
        eprintln!("Usage: ./blinkdb-server [/path/to/blinkdb.conf]");
        exit(1);
    } else {
        default_config_with_warning(log::log)
    };

    log::init(cfg.verbosity, &cfg.log_file);

    let store = Arc::new(Store::new(cfg.capacity, cfg.filter_bits));

    let start = Instant::now();
    if persist::load(&store, &cfg.db_filename) {
        log::log(
            LogLevel::Notice,
            &format!("DB loaded from disk in {:.3}s", start.elapsed().as_secs_f64()),
        );
    }

    let code = net::serve(store, cfg.port, &cfg.db_filename);
    exit(code);
}
