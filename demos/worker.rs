use std::time::Duration;

use mongo_job_queue::{JobQueue, JobQueueOptions, SleepWait};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Thumbnail {
    path: String,
    width: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let options = JobQueueOptions::default()
        .collection_name("thumbnails")
        .wait_strategy(SleepWait::new(Duration::from_secs(1), false));
    let queue: JobQueue<Thumbnail> =
        JobQueue::connect("mongodb://localhost:27017/queues", None, options).await?;

    if !queue.valid().await? {
        return Err("thumbnails collection exists but is not capped".into());
    }

    for (i, width) in [64, 128, 256].into_iter().enumerate() {
        queue
            .publish(Thumbnail {
                path: format!("images/{i}.png"),
                width,
            })
            .await?;
    }
    println!("{} jobs waiting", queue.queue_count().await?);

    // Blocks forever, waiting for more jobs once these three are done.
    queue
        .jobs()
        .run(|job| async move {
            println!("resizing {} to {}px", job.data.path, job.data.width);
            Ok::<_, anyhow::Error>(())
        })
        .await?;

    Ok(())
}
