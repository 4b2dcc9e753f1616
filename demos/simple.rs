use std::convert::Infallible;

use singleflight_sync::AsyncSingleFlight;

#[tokio::main]
async fn main() {
    let group = AsyncSingleFlight::new();
    let mut futures = Vec::new();
    for _ in 0..10 {
        futures.push(group.work("key", || async {
            println!("will sleep to simulate async task");
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            println!("real task done");
            Ok::<_, Infallible>("my-result")
        }));
    }

    let begin = std::time::Instant::now();
    for fut in futures.into_iter() {
        assert_eq!(fut.await, Ok("my-result"));
        println!("task finished");
    }
    println!("time elapsed: {:?}", begin.elapsed());
}
