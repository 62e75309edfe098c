//! Keyed de-duplication of concurrent async work.
//!
//! The first caller for a key starts the work. Callers arriving while it is
//! in flight, or within `release_delay` after it resolved, receive the same
//! result, error included. After the delay the key is free again.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type SharedResult<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

struct Flight<V, E> {
	id: u64,
	result: SharedResult<V, E>,
}

type FlightMap<K, V, E> = Arc<Mutex<HashMap<K, Flight<V, E>>>>;

pub struct SingleFlight<K, V, E>
where
	V: Clone,
	E: Clone,
{
	flights: FlightMap<K, V, E>,
	next_id: AtomicU64,
	release_delay: Duration,
}

impl<K, V, E> SingleFlight<K, V, E>
where
	K: Eq + Hash + Clone + Send + 'static,
	V: Clone + Send + Sync + 'static,
	E: Clone + Send + Sync + 'static,
{
	pub fn new(release_delay: Duration) -> Self {
		Self {
			flights: Arc::new(Mutex::new(HashMap::new())),
			next_id: AtomicU64::new(0),
			release_delay,
		}
	}

	/// Runs `work` unless a flight for `key` is already active, in which case
	/// its shared result is returned instead.
	pub async fn run<F, Fut>(&self, key: K, work: F) -> Result<V, E>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<V, E>> + Send + 'static,
	{
		let shared = {
			let mut flights = match self.flights.lock() {
				Ok(guard) => guard,
				Err(poisoned) => poisoned.into_inner(),
			};

			match flights.get(&key) {
				Some(flight) => flight.result.clone(),
				None => {
					let id = self.next_id.fetch_add(1, Ordering::Relaxed);
					let result = self.launch(key.clone(), id, work());
					flights.insert(
						key,
						Flight {
							id,
							result: result.clone(),
						},
					);
					result
				},
			}
		};

		shared.await
	}

	/// Number of keys currently held, in flight or awaiting release.
	pub fn active(&self) -> usize {
		match self.flights.lock() {
			Ok(flights) => flights.len(),
			Err(poisoned) => poisoned.into_inner().len(),
		}
	}

	fn launch<Fut>(&self, key: K, id: u64, work: Fut) -> SharedResult<V, E>
	where
		Fut: Future<Output = Result<V, E>> + Send + 'static,
	{
		let flights = Arc::clone(&self.flights);
		let release_delay = self.release_delay;

		async move {
			let result = work.await;
			tokio::spawn(async move {
				tokio::time::sleep(release_delay).await;
				let mut flights = match flights.lock() {
					Ok(guard) => guard,
					Err(poisoned) => poisoned.into_inner(),
				};
				// A newer flight may own the key by now
				if flights.get(&key).is_some_and(|flight| flight.id == id) {
					flights.remove(&key);
				}
			});
			result
		}
		.boxed()
		.shared()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::AtomicUsize;

	#[tokio::test]
	async fn test_concurrent_callers_share_one_run() {
		let flight = Arc::new(SingleFlight::<&str, u32, String>::new(Duration::from_millis(50)));
		let runs = Arc::new(AtomicUsize::new(0));

		let calls = (0..5).map(|_| {
			let flight = Arc::clone(&flight);
			let runs = Arc::clone(&runs);
			async move {
				flight
					.run("account", move || async move {
						runs.fetch_add(1, Ordering::SeqCst);
						tokio::time::sleep(Duration::from_millis(20)).await;
						Ok(42)
					})
					.await
			}
		});

		let results = futures::future::join_all(calls).await;
		assert!(results.iter().all(|r| *r == Ok(42)));
		assert_eq!(runs.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn test_errors_are_shared() {
		let flight = Arc::new(SingleFlight::<&str, u32, String>::new(Duration::from_millis(50)));
		let runs = Arc::new(AtomicUsize::new(0));

		let calls = (0..3).map(|_| {
			let flight = Arc::clone(&flight);
			let runs = Arc::clone(&runs);
			async move {
				flight
					.run("account", move || async move {
						runs.fetch_add(1, Ordering::SeqCst);
						tokio::time::sleep(Duration::from_millis(10)).await;
						Err::<u32, _>("cancelled".to_string())
					})
					.await
			}
		});

		let results = futures::future::join_all(calls).await;
		assert!(results.iter().all(|r| *r == Err("cancelled".to_string())));
		assert_eq!(runs.load(Ordering::SeqCst), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_key_released_after_delay() {
		let flight = SingleFlight::<&str, u32, String>::new(Duration::from_millis(500));

		assert_eq!(flight.run("account", || async { Ok(1) }).await, Ok(1));
		// Still held: the previous result is replayed
		assert_eq!(flight.run("account", || async { Ok(2) }).await, Ok(1));
		assert_eq!(flight.active(), 1);

		tokio::time::sleep(Duration::from_millis(600)).await;
		assert_eq!(flight.active(), 0);
		assert_eq!(flight.run("account", || async { Ok(3) }).await, Ok(3));
	}

	#[tokio::test]
	async fn test_keys_are_independent() {
		let flight = SingleFlight::<&str, u32, String>::new(Duration::from_millis(50));

		let (a, b) = tokio::join!(
			flight.run("alice", || async { Ok(1) }),
			flight.run("bob", || async { Ok(2) })
		);
		assert_eq!((a, b), (Ok(1), Ok(2)));
	}
}
