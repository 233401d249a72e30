//! Fixed-size request worker pool.
//!
//! The task queue is filled before any worker starts. Each worker pops one
//! task at a time, performs the request and sends the outcome down an
//! unbounded channel; it exits once the queue is empty. The channel closes
//! when the last worker drops its sender, which ends collection. A separate
//! monitor only watches the queue depth to drive the progress bar.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, info};

use super::title::{decode_body, extract_title};
use super::{FetchResult, FetchTask, Fetcher, PageClient};

type TaskQueue = Arc<Mutex<VecDeque<FetchTask>>>;

const MONITOR_TICK: Duration = Duration::from_millis(100);

/// Never more workers than tasks.
pub fn worker_count(configured: usize, tasks: usize) -> usize {
    configured.min(tasks).max(1)
}

pub struct WorkerPool<C> {
    client: Arc<C>,
    workers: usize,
    show_progress: bool,
}

impl<C: PageClient> WorkerPool<C> {
    pub fn new(client: C, workers: usize) -> Self {
        Self {
            client: Arc::new(client),
            workers,
            show_progress: true,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{msg} [{bar:40.green/blue}] {pos}/{len} ({eta})")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message("Requesting");
        bar
    }
}

#[async_trait]
impl<C: PageClient> Fetcher for WorkerPool<C> {
    async fn fetch_all(&self, tasks: Vec<FetchTask>) -> Vec<FetchResult> {
        let total = tasks.len();
        if total == 0 {
            return Vec::new();
        }

        let workers = worker_count(self.workers, total);
        info!("Requesting {total} pages with {workers} workers");

        let queue: TaskQueue = Arc::new(Mutex::new(VecDeque::from(tasks)));
        let (tx, mut rx) = mpsc::unbounded_channel();

        for id in 0..workers {
            tokio::spawn(worker(id, queue.clone(), self.client.clone(), tx.clone()));
        }
        drop(tx);

        let bar = self.progress_bar(total);
        let monitor = tokio::spawn(monitor(queue.clone(), total, bar.clone()));

        let mut results = Vec::with_capacity(total);
        while let Some(result) = rx.recv().await {
            results.push(result);
        }

        let _ = monitor.await;
        bar.finish_and_clear();

        results.sort_by_key(|r| (r.ip, r.port));
        info!("Finished requesting, {} responses", results.len());
        results
    }
}

fn next_task(queue: &TaskQueue) -> Option<FetchTask> {
    queue.lock().ok().and_then(|mut q| q.pop_front())
}

async fn worker<C: PageClient>(
    id: usize,
    queue: TaskQueue,
    client: Arc<C>,
    tx: UnboundedSender<FetchResult>,
) {
    while let Some(task) = next_task(&queue) {
        let result = match client.get(&task.url).await {
            Ok(page) => {
                let title = extract_title(&decode_body(&page.body));
                FetchResult::page(task, page.status, title)
            }
            Err(e) => {
                debug!("Request to {} failed: {e}", task.url);
                FetchResult::failed(task, e.to_string())
            }
        };

        if tx.send(result).is_err() {
            break;
        }
    }
    debug!("Request worker {id} done");
}

async fn monitor(queue: TaskQueue, total: usize, bar: ProgressBar) {
    loop {
        let remaining = queue.lock().map(|q| q.len()).unwrap_or(0);
        bar.set_position((total - remaining.min(total)) as u64);
        if remaining == 0 {
            break;
        }
        tokio::time::sleep(MONITOR_TICK).await;
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::fetch::Page;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageClient for FakeClient {
        async fn get(&self, url: &str) -> Result<Page> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if url.ends_with(":81") {
                return Err(Error::Scanner("connection refused".into()));
            }
            Ok(Page {
                status: 200,
                body: format!("<title>{url}</title>").into_bytes(),
            })
        }
    }

    fn task(port: u16) -> FetchTask {
        let ip = Ipv4Addr::new(10, 0, 0, 5);
        FetchTask {
            cidr: "10.0.0.0/24".parse().unwrap(),
            ip,
            port,
            url: FetchTask::url_for(ip, port, "http"),
        }
    }

    #[test]
    fn workers_are_capped_by_task_count() {
        assert_eq!(worker_count(32, 5), 5);
        assert_eq!(worker_count(32, 100), 32);
    }

    #[tokio::test]
    async fn every_task_yields_exactly_one_result() {
        let pool = WorkerPool::new(
            FakeClient {
                calls: AtomicUsize::new(0),
            },
            16,
        )
        .with_progress(false);

        let tasks: Vec<FetchTask> = (80..120).map(task).collect();
        let results = pool.fetch_all(tasks).await;

        assert_eq!(results.len(), 40);
        assert_eq!(pool.client.calls.load(Ordering::SeqCst), 40);

        let ok = results.iter().find(|r| r.port == 80).unwrap();
        assert_eq!(ok.title, "http://10.0.0.5:80");
        assert_eq!(ok.status, Some(200));

        let failed = results.iter().find(|r| r.port == 81).unwrap();
        assert_eq!(failed.status, None);
        assert!(failed.title.contains("connection refused"));
    }

    #[tokio::test]
    async fn empty_task_list_returns_immediately() {
        let pool = WorkerPool::new(
            FakeClient {
                calls: AtomicUsize::new(0),
            },
            16,
        )
        .with_progress(false);

        assert!(pool.fetch_all(Vec::new()).await.is_empty());
    }
}
