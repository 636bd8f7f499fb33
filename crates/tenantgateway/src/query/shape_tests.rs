use rstest::rstest;

use super::*;

const SEL: &str = r#"tenant_id=~"tenant-b""#;

#[rstest]
// Range vector: the selector lands between the metric name and the `[`.
#[case(
	"sum by (client, server) (rate(traces_service_graph_request_server_seconds_bucket[3600s]))",
	r#"sum by (client, server) (rate(traces_service_graph_request_server_seconds_bucket{tenant_id=~"tenant-b"}[3600s]))"#
)]
// Suffix aggregation clause: inside the argument list, before the last `)`
// preceding the clause.
#[case("sum(metric) by (host)", r#"sum(metric{tenant_id=~"tenant-b"}) by (host)"#)]
#[case(
	"sum(a) group_left(b) on(c)",
	r#"sum(a{tenant_id=~"tenant-b"}) group_left(b) on(c)"#
)]
// Bare offset: nothing to push inside, the selector stays on the metric.
#[case("metric offset 5m", r#"metric{tenant_id=~"tenant-b"} offset 5m"#)]
// Prefix aggregation: no `)` before the clause, falls through to the
// trailing parenthesis.
#[case("sum by (x) (metric)", r#"sum by (x) (metric{tenant_id=~"tenant-b"})"#)]
#[case("ceil(metric)", r#"ceil(metric{tenant_id=~"tenant-b"})"#)]
#[case("metric", r#"metric{tenant_id=~"tenant-b"}"#)]
fn promql_splice_strategies(#[case] query: &str, #[case] want: &str) {
	assert_eq!(splice_selector(query, SEL, Dialect::Promql), want);
}

#[test]
fn empty_queries_become_the_selector_alone() {
	assert_eq!(
		splice_selector("  ", SEL, Dialect::Promql),
		r#"{tenant_id=~"tenant-b"}"#
	);
	assert_eq!(splice_selector("", "", Dialect::Promql), "{}");
}

#[test]
fn logql_and_traceql_prefix_the_selector() {
	assert_eq!(
		splice_selector("|= \"error\"", SEL, Dialect::Logql),
		r#"{tenant_id=~"tenant-b"} |= "error""#
	);
	assert_eq!(
		splice_selector("avg(duration) > 1s", SEL, Dialect::Traceql),
		r#"{tenant_id=~"tenant-b"} avg(duration) > 1s"#
	);
}

#[test]
fn backslashes_in_the_selector_survive_splicing() {
	let sel = r#"instance=~"192\.168\.1\.1""#;
	let out = splice_selector("rate(node_load1[5m])", sel, Dialect::Promql);
	assert_eq!(out, r#"rate(node_load1{instance=~"192\.168\.1\.1"}[5m])"#);
}
