mod metric_sink;

pub use metric_sink::MetricSink;
