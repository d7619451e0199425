use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

use super::*;
use crate::config::TestConfig;
use crate::metrics::MetricsAggregator;
use crate::shutdown::shutdown_channel;

fn run_async_test<F>(future: F) -> Result<(), String>
where
    F: Future<Output = Result<(), String>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| format!("Failed to build runtime: {}", err))?;
    runtime.block_on(future)
}

/// Answers every connection with `status` after `delay`.
async fn spawn_http_server(status: u16, delay: Duration) -> Result<String, String> {
    let response = format!(
        "HTTP/1.1 {} Test\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
        status
    );
    spawn_raw_server(response, delay).await
}

/// Writes `response` verbatim to every connection, then closes it.
async fn spawn_raw_server(response: String, delay: Duration) -> Result<String, String> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|err| format!("bind failed: {}", err))?;
    let addr = listener
        .local_addr()
        .map_err(|err| format!("local_addr failed: {}", err))?;
    let response = Arc::new(response);
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let response = Arc::clone(&response);
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                if socket.read(&mut buf).await.is_err() {
                    return;
                }
                tokio::time::sleep(delay).await;
                if socket.write_all(response.as_bytes()).await.is_err() {
                    return;
                }
                drop(socket.shutdown().await);
            });
        }
    });
    Ok(format!("http://{}/", addr))
}

fn config_for(url: &str, method: &str, timeout: Duration) -> Result<TestConfig, String> {
    Ok(TestConfig {
        target_url: Url::parse(url).map_err(|err| format!("parse failed: {}", err))?,
        method: method.to_owned(),
        body: String::new(),
        headers: BTreeMap::new(),
        rps: 10,
        duration: Duration::from_secs(1),
        timeout,
        connections: 1,
    })
}

#[test]
fn tick_interval_uses_whole_milliseconds() -> Result<(), String> {
    let cases = [
        (1, 1000),
        (3, 333),
        (10, 100),
        (1000, 1),
        (5000, 1),
        (0, 1000),
    ];
    for (rps, expected_ms) in cases {
        let interval = tick_interval(rps);
        if interval != Duration::from_millis(expected_ms) {
            return Err(format!(
                "rps {} gave {:?}, expected {}ms",
                rps, interval, expected_ms
            ));
        }
    }
    Ok(())
}

#[test]
fn limiter_sheds_when_full_and_frees_on_drop() -> Result<(), String> {
    let limiter = ConcurrencyLimiter::new(2);
    let first = limiter.try_acquire().ok_or("Expected first slot")?;
    let second = limiter.try_acquire().ok_or("Expected second slot")?;
    if limiter.try_acquire().is_some() {
        return Err("Third slot should be refused".to_owned());
    }
    if limiter.in_flight() != 2 {
        return Err(format!("Unexpected in-flight: {}", limiter.in_flight()));
    }

    drop(first);
    if limiter.in_flight() != 1 {
        return Err("Dropped slot was not released".to_owned());
    }
    let third = limiter.try_acquire().ok_or("Expected slot after release")?;
    drop(second);
    drop(third);
    if limiter.in_flight() != 0 || limiter.capacity() != 2 {
        return Err("Limiter did not return to idle".to_owned());
    }
    Ok(())
}

#[test]
fn limiter_clamps_zero_capacity() -> Result<(), String> {
    let limiter = ConcurrencyLimiter::new(0);
    if limiter.capacity() != 1 {
        return Err(format!("Unexpected capacity: {}", limiter.capacity()));
    }
    Ok(())
}

#[test]
fn scheduler_ticks_at_fixed_rate_until_expiry() -> Result<(), String> {
    run_async_test(async {
        let (_stop_tx, mut stop_rx) = shutdown_channel();
        let scheduler = RateScheduler::new(20, Duration::from_millis(500));
        let mut calls: u64 = 0;
        let report = scheduler
            .run(&mut stop_rx, || {
                calls = calls.saturating_add(1);
                calls % 2 == 1
            })
            .await;

        if report.exit != SchedulerExit::Expired {
            return Err(format!("Unexpected exit: {:?}", report.exit));
        }
        if !(7..=10).contains(&report.ticks) {
            return Err(format!("Unexpected tick count: {}", report.ticks));
        }
        if report.ticks != calls
            || report.dispatched.saturating_add(report.dropped) != report.ticks
        {
            return Err(format!("Inconsistent report: {:?}", report));
        }
        Ok(())
    })
}

#[test]
fn scheduler_paces_five_per_second_for_two_seconds() -> Result<(), String> {
    run_async_test(async {
        let (_stop_tx, mut stop_rx) = shutdown_channel();
        let report = RateScheduler::new(5, Duration::from_secs(2))
            .run(&mut stop_rx, || true)
            .await;

        if report.exit != SchedulerExit::Expired {
            return Err(format!("Unexpected exit: {:?}", report.exit));
        }
        if !(9..=11).contains(&report.ticks) || report.dispatched != report.ticks {
            return Err(format!("Expected about 10 dispatches: {:?}", report));
        }
        Ok(())
    })
}

#[test]
fn scheduler_keeps_running_for_huge_durations() -> Result<(), String> {
    run_async_test(async {
        let (stop_tx, mut stop_rx) = shutdown_channel();
        let scheduler = RateScheduler::new(100, Duration::from_secs(9_223_372_036_854_775_807));
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            drop(stop_tx.send(()));
        });

        let report = tokio::time::timeout(
            Duration::from_secs(2),
            scheduler.run(&mut stop_rx, || true),
        )
        .await
        .map_err(|err| format!("Scheduler ignored stop: {}", err))?;

        if report.exit != SchedulerExit::Stopped {
            return Err(format!("Run ended on its own: {:?}", report));
        }
        if report.ticks == 0 {
            return Err("Expected ticks before the stop".to_owned());
        }
        Ok(())
    })
}

#[test]
fn scheduler_stops_before_first_tick() -> Result<(), String> {
    run_async_test(async {
        let (stop_tx, mut stop_rx) = shutdown_channel();
        let scheduler = RateScheduler::new(1, Duration::from_secs(30));
        stop_tx
            .send(())
            .map_err(|err| format!("send failed: {}", err))?;

        let report = tokio::time::timeout(
            Duration::from_secs(1),
            scheduler.run(&mut stop_rx, || true),
        )
        .await
        .map_err(|err| format!("Scheduler ignored stop: {}", err))?;

        if report.exit != SchedulerExit::Stopped || report.ticks != 0 {
            return Err(format!("Unexpected report: {:?}", report));
        }
        Ok(())
    })
}

#[test]
fn executor_records_non_success_status() -> Result<(), String> {
    run_async_test(async {
        let url = spawn_http_server(404, Duration::ZERO).await?;
        let config = config_for(&url, "GET", Duration::from_secs(5))?;
        let client = build_client(config.timeout).map_err(|err| err.to_string())?;
        let executor = RequestExecutor::new(client, &config);

        let outcome = executor.execute().await;
        if outcome.status != Some(404) || outcome.error.as_deref() != Some("HTTP 404") {
            return Err(format!("Unexpected outcome: {:?}", outcome));
        }
        Ok(())
    })
}

#[test]
fn executor_reports_timeouts() -> Result<(), String> {
    run_async_test(async {
        let url = spawn_http_server(200, Duration::from_secs(3)).await?;
        let config = config_for(&url, "GET", Duration::from_millis(200))?;
        let client = build_client(config.timeout).map_err(|err| err.to_string())?;
        let executor = RequestExecutor::new(client, &config);

        let outcome = executor.execute().await;
        let is_timeout = outcome
            .error
            .as_deref()
            .is_some_and(|error| error.starts_with("timeout"));
        if outcome.status.is_some() || !is_timeout {
            return Err(format!("Expected timeout, got {:?}", outcome));
        }
        if outcome.latency >= Duration::from_secs(3) {
            return Err(format!("Timeout not enforced: {:?}", outcome.latency));
        }
        Ok(())
    })
}

#[test]
fn executor_reports_connection_errors() -> Result<(), String> {
    run_async_test(async {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|err| format!("bind failed: {}", err))?;
        let addr = listener
            .local_addr()
            .map_err(|err| format!("local_addr failed: {}", err))?;
        drop(listener);

        let config = config_for(&format!("http://{}/", addr), "GET", Duration::from_secs(2))?;
        let client = build_client(config.timeout).map_err(|err| err.to_string())?;
        let outcome = RequestExecutor::new(client, &config).execute().await;
        if outcome.status.is_some() || outcome.is_success() {
            return Err(format!("Expected failure, got {:?}", outcome));
        }
        Ok(())
    })
}

#[test]
fn executor_fails_every_dispatch_for_invalid_method() -> Result<(), String> {
    run_async_test(async {
        let config = config_for("http://127.0.0.1:9/", "BAD METHOD", Duration::from_secs(1))?;
        let client = build_client(config.timeout).map_err(|err| err.to_string())?;
        let executor = RequestExecutor::new(client, &config);

        for _ in 0..2 {
            let outcome = executor.execute().await;
            let is_build_error = outcome
                .error
                .as_deref()
                .is_some_and(|error| error.starts_with("Failed to create request"));
            if !is_build_error || outcome.status.is_some() {
                return Err(format!("Unexpected outcome: {:?}", outcome));
            }
        }
        Ok(())
    })
}

#[test]
fn executor_run_records_and_releases_slot() -> Result<(), String> {
    run_async_test(async {
        let url = spawn_http_server(200, Duration::ZERO).await?;
        let config = config_for(&url, "POST", Duration::from_secs(5))?;
        let client = build_client(config.timeout).map_err(|err| err.to_string())?;
        let executor = RequestExecutor::new(client, &config);
        let metrics = Arc::new(MetricsAggregator::new());
        let limiter = ConcurrencyLimiter::new(1);

        let slot = limiter.try_acquire().ok_or("Expected slot")?;
        executor.run(slot, Arc::clone(&metrics)).await;

        if limiter.in_flight() != 0 {
            return Err("Slot not released after run".to_owned());
        }
        let snapshot = metrics.snapshot().await;
        if snapshot.total_requests != 1 || snapshot.status_codes.get("200") != Some(&1) {
            return Err(format!("Unexpected snapshot: {:?}", snapshot));
        }
        Ok(())
    })
}

#[test]
fn executor_keeps_status_when_body_is_cut_short() -> Result<(), String> {
    run_async_test(async {
        for (status, success) in [(404, false), (200, true)] {
            let response = format!(
                "HTTP/1.1 {} Test\r\nContent-Length: 100\r\nConnection: close\r\n\r\nshort",
                status
            );
            let url = spawn_raw_server(response, Duration::ZERO).await?;
            let config = config_for(&url, "GET", Duration::from_secs(5))?;
            let client = build_client(config.timeout).map_err(|err| err.to_string())?;
            let executor = RequestExecutor::new(client, &config);
            let metrics = MetricsAggregator::new();

            let outcome = executor.execute().await;
            if outcome.status != Some(status) || outcome.is_success() != success {
                return Err(format!("Unexpected outcome for {}: {:?}", status, outcome));
            }
            metrics.record_outcome(outcome).await;
            let snapshot = metrics.snapshot().await;
            if snapshot.status_codes.get(&status.to_string()) != Some(&1) {
                return Err(format!("Status {} missing from histogram", status));
            }
        }
        Ok(())
    })
}
