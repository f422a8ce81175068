use std::future::Future;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use super::{FetchError, Segment};

#[derive(Debug)]
pub struct SegmentOutcome {
    pub index: usize,
    pub result: Result<u64, FetchError>,
}

impl SegmentOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Drive up to `limit` segment fetches concurrently until the whole batch has
/// completed. A finishing fetch immediately frees its slot for the next
/// queued segment, and one segment's failure never aborts the rest; callers
/// decide afterwards whether enough of the batch arrived.
///
/// Returns exactly one outcome per input segment, indexed by the segment's
/// original position regardless of completion order.
pub async fn run_all<F, Fut>(segments: &[Segment], limit: usize, fetch: F) -> Vec<SegmentOutcome>
where
    F: Fn(Segment) -> Fut,
    Fut: Future<Output = Result<u64, FetchError>>,
{
    let total = segments.len();
    let mut outcomes: Vec<Option<SegmentOutcome>> = Vec::new();
    outcomes.resize_with(total, || None);

    let mut completions = stream::iter(segments.iter().cloned())
        .map(|segment| {
            let index = segment.index;
            let fut = fetch(segment);
            async move { (index, fut.await) }
        })
        .buffer_unordered(limit.max(1));

    while let Some((index, result)) = completions.next().await {
        match &result {
            Ok(bytes) => debug!(segment = index + 1, total, bytes, "segment downloaded"),
            Err(err) => warn!(segment = index + 1, total, error = %err, "segment failed"),
        }
        if let Some(slot) = outcomes.get_mut(index) {
            *slot = Some(SegmentOutcome { index, result });
        }
    }

    outcomes.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::sleep;

    use super::*;

    fn segments(count: usize) -> Vec<Segment> {
        (0..count)
            .map(|index| Segment {
                index,
                url: format!("https://h/seg_{index}.ts"),
            })
            .collect()
    }

    #[tokio::test]
    async fn outcomes_indexed_by_position_under_reordered_completion() {
        let input = segments(5);
        // Earlier segments finish last.
        let outcomes = run_all(&input, 5, |segment| async move {
            sleep(Duration::from_millis((5 - segment.index as u64) * 10)).await;
            Ok(segment.index as u64 * 100)
        })
        .await;
        assert_eq!(outcomes.len(), 5);
        for (position, outcome) in outcomes.iter().enumerate() {
            assert_eq!(outcome.index, position);
            assert_eq!(*outcome.result.as_ref().unwrap(), position as u64 * 100);
        }
    }

    #[tokio::test]
    async fn failed_segment_does_not_abort_batch() {
        let input = segments(4);
        let outcomes = run_all(&input, 2, |segment| async move {
            if segment.index == 1 {
                Err(FetchError::Exhausted {
                    attempts: 3,
                    last: Box::new(FetchError::Timeout { url: segment.url }),
                })
            } else {
                Ok(1)
            }
        })
        .await;
        assert_eq!(outcomes.len(), 4);
        assert!(!outcomes[1].is_success());
        assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 3);
    }

    #[tokio::test]
    async fn in_flight_fetches_never_exceed_limit() {
        let input = segments(12);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let outcomes = run_all(&input, 3, |_| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(0)
            }
        })
        .await;
        assert_eq!(outcomes.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }
}
