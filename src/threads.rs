//! Thread pool implementation from The Book, ported from oxidicom's
//! `thread_pool.rs`.
//! <https://doc.rust-lang.org/book/ch20-02-multithreaded.html>

use std::sync::{mpsc, Arc, Mutex};
use std::thread;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Simple thread pool backing the Store Receiver's per-association workers.
pub struct ThreadPool {
    workers: Vec<Worker>,
    sender: Option<mpsc::Sender<Job>>,
}

impl ThreadPool {
    /// Create a thread pool of `size` workers, named `name` for logging.
    pub fn new(size: usize, name: &'static str) -> ThreadPool {
        if size == 0 {
            panic!("Thread pool cannot have 0 threads.")
        }

        let (sender, receiver) = mpsc::channel();
        let receiver = Arc::new(Mutex::new(receiver));
        let workers = (0..size)
            .map(|id| Worker::new(id, Arc::clone(&receiver), name))
            .collect();

        ThreadPool {
            workers,
            sender: Some(sender),
        }
    }

    /// Run a job on this thread pool.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let job = Box::new(f);
        self.sender
            .as_ref()
            .expect("thread pool has been shut down")
            .send(job)
            .unwrap();
    }

    /// Close the thread pool, joining every worker.
    pub fn shutdown(&mut self) {
        drop(self.sender.take());
        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                thread.join().unwrap();
            }
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker {
    thread: Option<thread::JoinHandle<()>>,
}

impl Worker {
    fn new(id: usize, receiver: Arc<Mutex<mpsc::Receiver<Job>>>, pool_name: &'static str) -> Worker {
        let thread = thread::spawn(move || {
            tracing::debug!("starting worker {pool_name}/{id}");
            loop {
                let message = receiver.lock().unwrap().recv();
                match message {
                    Ok(job) => job(),
                    Err(_) => {
                        tracing::debug!("shutting down worker {pool_name}/{id}");
                        break;
                    }
                }
            }
        });

        Worker { thread: Some(thread) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn runs_submitted_jobs() {
        let pool = ThreadPool::new(2, "test");
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            pool.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        drop(pool);
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }
}
