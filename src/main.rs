//! Courses is a microservice selling courses and issuing certificates.
//! This create is for running the service from `courses_lib`. See `courses_lib` for details.

extern crate courses_lib;

fn main() {
    let config = courses_lib::config::Config::new().expect("Can't load app config!");

    // Prepare logger
    courses_lib::logging::init(config.logging.as_ref());

    courses_lib::start_server(config, &None, || ());
}
