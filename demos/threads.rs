use std::{thread, time::Duration};

use singleflight_sync::SingleFlight;

const THREADS: usize = 5;

fn long_running(tid: usize) -> Result<String, std::io::Error> {
    println!("long_running call by thread {tid}");
    thread::sleep(Duration::from_millis(1000));
    Ok("Result from long_running".to_string())
}

fn failing(tid: usize) -> Result<String, std::io::Error> {
    println!("failing call by thread {tid}");
    thread::sleep(Duration::from_millis(500));
    Err(std::io::Error::new(
        std::io::ErrorKind::Other,
        "io error from failing",
    ))
}

type Func = fn(usize) -> Result<String, std::io::Error>;

fn run(group: &SingleFlight<&'static str, String>, func: Func) {
    thread::scope(|s| {
        for tid in 0..THREADS {
            s.spawn(move || {
                println!("thread {tid} starts");
                match group.work("some-key", || func(tid)) {
                    Ok(res) => println!("thread {tid} result: {res}"),
                    Err(err) => println!("thread {tid} caught: {err}"),
                }
            });
        }
    });
}

fn main() {
    let group = SingleFlight::new();

    println!("====== long running ======");
    run(&group, long_running);

    println!("====== failing ======");
    run(&group, failing);
}
