use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use anyhow::Result;

pub struct Scheduler {
    interval: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(anyhow::anyhow!("scheduler interval must be greater than zero"));
        }
        Ok(Self { interval })
    }

    /// Run one job to completion, then sleep out whatever is left of the interval.
    /// A job that overruns the interval is followed immediately by the next one.
    pub async fn tick<F>(&self, job: F)
    where
        F: Future<Output = ()>,
    {
        let start = Instant::now();
        job.await;
        if let Some(rest) = self.interval.checked_sub(start.elapsed()) {
            if !rest.is_zero() {
                sleep(rest).await;
            }
        }
    }

    /// job: async closure for each tick, never overlapping the previous one
    pub async fn run<J, F>(&self, mut job: J) -> Result<()>
    where
        J: FnMut() -> F,
        F: Future<Output = ()>,
    {
        loop {
            self.tick(job()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn zero_interval_is_rejected() {
        assert!(Scheduler::new(Duration::ZERO).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn fast_job_waits_out_the_interval() {
        let scheduler = Scheduler::new(Duration::from_secs(1)).unwrap();
        let start = Instant::now();
        scheduler.tick(sleep(Duration::from_millis(150))).await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed < Duration::from_millis(1010));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_job_gets_no_extra_sleep() {
        let scheduler = Scheduler::new(Duration::from_secs(1)).unwrap();
        let start = Instant::now();
        scheduler.tick(sleep(Duration::from_millis(1500))).await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1500));
        assert!(elapsed < Duration::from_millis(1510));
    }

    #[tokio::test(start_paused = true)]
    async fn iterations_start_one_interval_apart() {
        let scheduler = Scheduler::new(Duration::from_secs(1)).unwrap();
        let origin = Instant::now();
        let starts = Arc::new(Mutex::new(Vec::new()));

        let recorded = starts.clone();
        let _ = tokio::time::timeout(
            Duration::from_millis(3500),
            scheduler.run(move || {
                let recorded = recorded.clone();
                async move {
                    recorded.lock().unwrap().push(origin.elapsed());
                    sleep(Duration::from_millis(200)).await;
                }
            }),
        )
        .await;

        let starts = starts.lock().unwrap().clone();
        assert_eq!(starts.len(), 4);
        for (i, at) in starts.iter().enumerate() {
            let expected = Duration::from_secs(i as u64);
            assert!(*at >= expected && *at < expected + Duration::from_millis(10));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn overrun_does_not_catch_up() {
        let scheduler = Scheduler::new(Duration::from_secs(1)).unwrap();
        let origin = Instant::now();
        let starts = Arc::new(Mutex::new(Vec::new()));

        let recorded = starts.clone();
        let _ = tokio::time::timeout(
            Duration::from_millis(4000),
            scheduler.run(move || {
                let recorded = recorded.clone();
                async move {
                    recorded.lock().unwrap().push(origin.elapsed());
                    sleep(Duration::from_millis(1300)).await;
                }
            }),
        )
        .await;

        // each overrun pushes the next start back by 300ms; no skipped or doubled ticks
        let starts = starts.lock().unwrap().clone();
        assert_eq!(starts.len(), 4);
        for (i, at) in starts.iter().enumerate() {
            let expected = Duration::from_millis(1300 * i as u64);
            assert!(*at >= expected && *at < expected + Duration::from_millis(10));
        }
    }
}
