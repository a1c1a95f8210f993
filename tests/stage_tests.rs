mod common;

use std::fs;
use std::time::{Duration, Instant};

use common::{lines, toolkit, write_ffuf_report, FakeCt, FakeLocator, ScriptedRunner};
use reconflow::config::{NaabuConfig, StepToggles};
use reconflow::discover::{dnsresolve, subenum};
use reconflow::fuzz::ffuf::{BruteForceSettings, BruteForcer};
use reconflow::output::LineSet;
use reconflow::probe::{http_probe, ports};
use reconflow::RunContext;
use tokio_util::sync::CancellationToken;

fn context(tmp: &tempfile::TempDir) -> RunContext {
    RunContext::new("example.com", &tmp.path().join("example.com"), 10, Some("/wl/common.txt".into())).unwrap()
}

#[tokio::test]
async fn enumeration_merge_case_folds_and_dedups() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = context(&tmp);
    let runner = ScriptedRunner::new(|cmd| match cmd.tool_name() {
        "subfinder" => lines(&["a.example.com", "A.example.com", "b.example.com"]),
        _ => Vec::new(),
    });
    let ct = FakeCt::with(&["never.example.com"]);
    let tk = toolkit(runner.clone(), FakeLocator::all(), ct.clone());

    let subs = subenum::enumerate(&ctx, &StepToggles::default(), &tk).await.unwrap();

    assert_eq!(subs.count, 2);
    assert_eq!(fs::read_to_string(ctx.subs_file()).unwrap(), "a.example.com\nb.example.com\n");
    assert_eq!(runner.calls_to("subfinder"), 1);
    assert_eq!(runner.calls_to("amass"), 1);
    assert_eq!(ct.call_count(), 0, "fallback must not run when passive sources found names");
}

#[tokio::test]
async fn enumeration_falls_back_to_certificate_transparency() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = context(&tmp);
    let runner = ScriptedRunner::silent();
    let ct = FakeCt::with(&["*.Shop.example.com", "api.example.com", "api.example.com"]);
    let tk = toolkit(runner, FakeLocator::all(), ct.clone());

    let subs = subenum::enumerate(&ctx, &StepToggles::default(), &tk).await.unwrap();

    assert_eq!(ct.call_count(), 1);
    assert_eq!(subs.count, 2);
    assert_eq!(fs::read_to_string(ctx.subs_file()).unwrap(), "api.example.com\nshop.example.com\n");
}

#[tokio::test]
async fn disabled_passive_sources_are_not_invoked() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = context(&tmp);
    let runner = ScriptedRunner::silent();
    let tk = toolkit(runner.clone(), FakeLocator::all(), FakeCt::with(&[]));
    let steps = StepToggles { subfinder: false, amass: false, ..StepToggles::default() };

    let subs = subenum::enumerate(&ctx, &steps, &tk).await.unwrap();

    assert!(subs.is_empty());
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn resolve_resumes_from_existing_artifact() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = context(&tmp);
    fs::write(ctx.resolved_file(), "a.example.com\nb.example.com\n").unwrap();
    let runner = ScriptedRunner::new(|_| lines(&["other.example.com"]));
    let tk = toolkit(runner.clone(), FakeLocator::all(), FakeCt::with(&[]));

    let res = dnsresolve::dnsx_filter(&ctx, &tk, &ctx.subs_file(), None).await.unwrap();

    assert_eq!(res.count, 2);
    assert!(runner.calls().is_empty());
    assert_eq!(fs::read_to_string(ctx.resolved_file()).unwrap(), "a.example.com\nb.example.com\n");

    let forced = ctx.clone().with_force(true);
    let res = dnsresolve::dnsx_filter(&forced, &tk, &ctx.subs_file(), None).await.unwrap();
    assert_eq!(res.count, 1);
    assert_eq!(runner.calls_to("dnsx"), 1);
}

#[tokio::test]
async fn resolve_passes_custom_resolvers() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = context(&tmp);
    let runner = ScriptedRunner::silent();
    let tk = toolkit(runner.clone(), FakeLocator::all(), FakeCt::with(&[]));
    let resolvers = tmp.path().join("resolvers.txt");

    dnsresolve::dnsx_filter(&ctx, &tk, &ctx.subs_file(), Some(&resolvers)).await.unwrap();

    let call = &runner.calls()[0];
    assert_eq!(call.flag_value("-r"), Some(&*resolvers.to_string_lossy()));
    assert_eq!(call.flag_value("-t"), Some("10"));
}

#[tokio::test]
async fn naabu_lines_become_host_port_tokens() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = context(&tmp);
    let runner = ScriptedRunner::new(|_| {
        lines(&[
            r#"{"host":"a.example.com","ip":"10.0.0.1","port":443}"#,
            r#"{"ip":"10.0.0.2","port":8080}"#,
            "garbage",
            r#"{"host":"a.example.com","port":443}"#,
            r#"{"host":"c.example.com"}"#,
        ])
    });
    let tk = toolkit(runner.clone(), FakeLocator::all(), FakeCt::with(&[]));

    let res = ports::naabu_scan(&ctx, &tk, &ctx.resolved_file(), &NaabuConfig::default()).await.unwrap();

    assert_eq!(res.count, 2);
    assert_eq!(fs::read_to_string(ctx.naabu_file()).unwrap(), "10.0.0.2:8080\na.example.com:443\n");
}

#[tokio::test]
async fn probe_first_tier_hit_short_circuits_cascade() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = context(&tmp);
    fs::write(ctx.naabu_file(), "a.example.com:443\n").unwrap();
    let runner = ScriptedRunner::new(|cmd| match cmd.tool_name() {
        "httpx" => lines(&[r#"{"url":"https://a.example.com","status_code":200}"#, "not json"]),
        _ => lines(&["http://should-not-be-used.example.com"]),
    });
    let tk = toolkit(runner.clone(), FakeLocator::all(), FakeCt::with(&[]));

    let hosts = http_probe::probe_live_hosts(&ctx, &tk, &ctx.resolved_file(), Some(&ctx.naabu_file())).await.unwrap();

    assert_eq!(hosts.count, 1);
    assert_eq!(runner.calls().len(), 1, "tiers 2-4 must not run");
    assert!(runner.calls()[0].has_arg("-ports-file"));
    assert_eq!(fs::read_to_string(ctx.hosts_file()).unwrap(), "https://a.example.com\n");
    assert!(ctx.web.join("httpx_naabu_raw.jsonl").exists());
}

#[tokio::test]
async fn probe_falls_through_until_a_tier_finds_hosts() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = context(&tmp);
    fs::write(ctx.naabu_file(), "a.example.com:443\n").unwrap();
    let runner = ScriptedRunner::new(|cmd| {
        if common::invokes(cmd, "httprobe") && cmd.to_string().contains("https:8443") {
            lines(&["http://a.example.com:8080", "https://a.example.com"])
        } else {
            Vec::new()
        }
    });
    let tk = toolkit(runner.clone(), FakeLocator::all(), FakeCt::with(&[]));

    let hosts = http_probe::probe_live_hosts(&ctx, &tk, &ctx.resolved_file(), Some(&ctx.naabu_file())).await.unwrap();

    assert_eq!(hosts.count, 2);
    assert_eq!(runner.calls_to("httpx"), 1);
    assert_eq!(runner.calls_to("httprobe"), 2);
}

#[tokio::test]
async fn probe_without_httpx_skips_httpx_tiers() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = context(&tmp);
    fs::write(ctx.naabu_file(), "a.example.com:443\n").unwrap();
    let runner = ScriptedRunner::silent();
    let tk = toolkit(runner.clone(), FakeLocator::without_httpx(), FakeCt::with(&[]));

    let hosts = http_probe::probe_live_hosts(&ctx, &tk, &ctx.resolved_file(), Some(&ctx.naabu_file())).await.unwrap();

    assert!(hosts.is_empty());
    assert_eq!(runner.calls_to("httprobe"), 2);
    assert_eq!(runner.calls_to("httpx"), 0);
}

#[tokio::test]
async fn probe_last_tier_sweeps_fallback_ports() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = context(&tmp);
    let runner = ScriptedRunner::new(|cmd| {
        if cmd.tool_name() == "httpx" {
            lines(&[r#"{"url":"http://a.example.com:9090"}"#])
        } else {
            Vec::new()
        }
    });
    let tk = toolkit(runner.clone(), FakeLocator::all(), FakeCt::with(&[]));

    // no port-scan artifact: tier 1 is unreachable
    let hosts = http_probe::probe_live_hosts(&ctx, &tk, &ctx.resolved_file(), None).await.unwrap();

    assert_eq!(hosts.count, 1);
    let calls = runner.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls[2].flag_value("-ports").unwrap().contains("10443"));
}

fn ffuf_settings(budget: Option<Duration>) -> BruteForceSettings {
    BruteForceSettings {
        binary: "/fake/bin/ffuf".into(),
        wordlist: "/wl/common.txt".into(),
        threads: 20,
        extensions: None,
        rate_limit: None,
        allowed: [200, 301].into_iter().collect(),
        max_workers: 2,
        global_budget: budget,
        job_budget: Duration::from_secs(60),
    }
}

const FFUF_REPORT: &str = r#"{"results":[
    {"status":200,"url":"https://a.example.com/admin"},
    {"status":404,"url":"https://a.example.com/missing"},
    {"status":301,"url":"https://a.example.com/old"}
]}"#;

#[tokio::test]
async fn brute_force_keeps_only_allowed_statuses() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = context(&tmp);
    let runner = ScriptedRunner::new(|cmd| {
        write_ffuf_report(cmd, FFUF_REPORT);
        Vec::new()
    });
    let hosts: LineSet = ["https://a.example.com"].into_iter().collect();
    let forcer = BruteForcer::new(runner.clone(), ffuf_settings(None), CancellationToken::new());

    let res = forcer.run(&ctx, &hosts).await.unwrap();

    assert_eq!(res.count, 2);
    assert_eq!(
        fs::read_to_string(ctx.ffuf_found_file()).unwrap(),
        "https://a.example.com/admin\nhttps://a.example.com/old\n"
    );
    assert!(ctx.ffuf.join("https_a.example.com.json").exists());
}

#[tokio::test]
async fn brute_force_fans_out_over_every_host() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = context(&tmp);
    let runner = ScriptedRunner::new(|cmd| {
        let url = cmd.flag_value("-u").unwrap_or_default().replace("FUZZ", "x");
        write_ffuf_report(cmd, &format!(r#"{{"results":[{{"status":200,"url":"{url}"}}]}}"#));
        Vec::new()
    });
    let hosts: LineSet = ["https://a.example.com", "https://b.example.com", "http://c.example.com:8080"]
        .into_iter()
        .collect();
    let forcer = BruteForcer::new(runner.clone(), ffuf_settings(Some(Duration::from_secs(300))), CancellationToken::new());

    let res = forcer.run(&ctx, &hosts).await.unwrap();

    assert_eq!(runner.calls_to("ffuf"), 3);
    assert_eq!(res.count, 3);
    assert!(ctx.ffuf.join("http_c.example.com_8080.json").exists());
}

#[tokio::test]
async fn brute_force_with_exhausted_budget_submits_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = context(&tmp);
    let runner = ScriptedRunner::new(|cmd| {
        write_ffuf_report(cmd, FFUF_REPORT);
        Vec::new()
    });
    let hosts: LineSet = ["https://a.example.com", "https://b.example.com"].into_iter().collect();
    let forcer = BruteForcer::new(runner.clone(), ffuf_settings(Some(Duration::from_secs(1))), CancellationToken::new());
    let started = Instant::now().checked_sub(Duration::from_secs(10)).unwrap();

    let res = forcer.run_from(&ctx, &hosts, started).await.unwrap();

    assert_eq!(res.count, 0);
    assert_eq!(runner.calls_to("ffuf"), 0);
    assert_eq!(fs::read_to_string(ctx.ffuf_found_file()).unwrap(), "");
}

#[tokio::test]
async fn brute_force_cancelled_before_start_returns_no_results() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = context(&tmp);
    let runner = ScriptedRunner::new(|cmd| {
        write_ffuf_report(cmd, FFUF_REPORT);
        Vec::new()
    });
    let hosts: LineSet = ["https://a.example.com"].into_iter().collect();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let forcer = BruteForcer::new(runner.clone(), ffuf_settings(None), cancel);

    let res = forcer.run(&ctx, &hosts).await.unwrap();

    assert_eq!(res.count, 0);
    assert_eq!(runner.calls_to("ffuf"), 0);
}

#[tokio::test]
async fn brute_force_with_no_hosts_writes_empty_result() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = context(&tmp);
    let runner = ScriptedRunner::silent();
    let forcer = BruteForcer::new(runner.clone(), ffuf_settings(None), CancellationToken::new());

    let res = forcer.run(&ctx, &LineSet::new()).await.unwrap();

    assert!(res.is_empty());
    assert!(ctx.ffuf_found_file().exists());
    assert!(runner.calls().is_empty());
}

/// ffuf fake: every job finds `<host>/admin`.
fn admin_found(cmd: &reconflow::ToolCommand) -> Vec<String> {
    let url = cmd.flag_value("-u").unwrap_or_default().replace("FUZZ", "admin");
    write_ffuf_report(cmd, &format!(r#"{{"results":[{{"status":200,"url":"{url}"}}]}}"#));
    Vec::new()
}

#[tokio::test]
async fn brute_force_keeps_both_schemes_of_one_host_apart() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = context(&tmp);
    let runner = ScriptedRunner::new(admin_found);
    let hosts: LineSet = ["http://a.example.com", "https://a.example.com"].into_iter().collect();
    let forcer = BruteForcer::new(runner.clone(), ffuf_settings(None), CancellationToken::new());

    let res = forcer.run(&ctx, &hosts).await.unwrap();

    let outputs: Vec<String> =
        runner.calls().iter().filter_map(|c| c.flag_value("-o").map(str::to_string)).collect();
    assert_eq!(outputs.len(), 2);
    assert_ne!(outputs[0], outputs[1]);
    assert_eq!(res.count, 2);
    assert_eq!(
        fs::read_to_string(ctx.ffuf_found_file()).unwrap(),
        "http://a.example.com/admin\nhttps://a.example.com/admin\n"
    );
}

#[tokio::test]
async fn brute_force_stops_when_budget_runs_out_mid_fan_out() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = context(&tmp);
    let runner = ScriptedRunner::slow(admin_found, Duration::from_millis(150));
    let hosts: LineSet = (1..=6).map(|i| format!("https://h{i}.example.com")).collect();
    let settings = BruteForceSettings { max_workers: 1, ..ffuf_settings(Some(Duration::from_millis(200))) };
    let forcer = BruteForcer::new(runner.clone(), settings, CancellationToken::new());

    let res = forcer.run(&ctx, &hosts).await.unwrap();

    let calls = runner.calls_to("ffuf");
    assert!(calls >= 1, "the first job starts inside the budget");
    assert!(calls < hosts.len(), "{calls} jobs ran despite the exhausted budget");
    assert!(res.count <= calls);
    assert!(ctx.ffuf_found_file().exists());
}

#[tokio::test]
async fn brute_force_cancelled_mid_run_submits_no_further_jobs() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = context(&tmp);
    let cancel = CancellationToken::new();
    let trip = cancel.clone();
    let runner = ScriptedRunner::new(move |cmd| {
        trip.cancel();
        admin_found(cmd)
    });
    let hosts: LineSet = (1..=4).map(|i| format!("https://h{i}.example.com")).collect();
    let settings = BruteForceSettings { max_workers: 1, ..ffuf_settings(None) };
    let forcer = BruteForcer::new(runner.clone(), settings, cancel);

    let res = forcer.run(&ctx, &hosts).await.unwrap();

    assert_eq!(runner.calls_to("ffuf"), 1);
    assert_eq!(res.count, 0, "a job finishing after cancellation is discarded");
    assert_eq!(fs::read_to_string(ctx.ffuf_found_file()).unwrap(), "");
}

#[tokio::test]
async fn brute_force_ignores_reports_from_earlier_runs() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = context(&tmp).with_force(true);
    fs::write(ctx.ffuf.join("https_a.example.com.json"), FFUF_REPORT).unwrap();
    let runner = ScriptedRunner::silent();
    let hosts: LineSet = ["https://a.example.com"].into_iter().collect();
    let forcer = BruteForcer::new(runner.clone(), ffuf_settings(None), CancellationToken::new());

    let res = forcer.run(&ctx, &hosts).await.unwrap();

    assert_eq!(runner.calls_to("ffuf"), 1);
    assert_eq!(res.count, 0);
    assert!(!ctx.ffuf.join("https_a.example.com.json").exists());
}
