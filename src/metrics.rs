use enervu_rs::{Error, Status};
use num::ToPrimitive;
use prometheus::{Encoder, Gauge, GaugeVec, IntCounter, IntGauge, TextEncoder};

lazy_static! {
    static ref GRID_POWER_GAUGE: Gauge = register_gauge!(opts!(
        "enervu_grid_power",
        "power exchanged with the grid (in W)",
    ))
    .unwrap();
    static ref LOAD_POWER_GAUGE: Gauge = register_gauge!(opts!(
        "enervu_load_power",
        "power consumed by the house (in W)",
    ))
    .unwrap();
    static ref PV_POWER_GAUGE: Gauge = register_gauge!(opts!(
        "enervu_pv_power",
        "power produced by the PV array (in W)",
    ))
    .unwrap();
    static ref BATTERY_POWER_GAUGE: Gauge = register_gauge!(opts!(
        "enervu_battery_power",
        "battery charge or discharge power (in W)",
    ))
    .unwrap();
    static ref BATTERY_SOC_GAUGE: Gauge = register_gauge!(opts!(
        "enervu_battery_soc",
        "battery state of charge (in %)",
    ))
    .unwrap();
    static ref BATTERY_STATUS_GAUGE: IntGauge = register_int_gauge!(opts!(
        "enervu_battery_status",
        "battery status code (0 standby, 1 charging, 2 discharging, 255 unknown)",
    ))
    .unwrap();
    static ref ENGINE_STATE_GAUGE: IntGauge = register_int_gauge!(opts!(
        "enervu_engine_state",
        "engine state (-1 bad login, 0 starting, 1 error, 2 active)",
    ))
    .unwrap();
    static ref STALE_CYCLES_GAUGE: IntGauge = register_int_gauge!(opts!(
        "enervu_stale_cycles",
        "consecutive polls that returned an already known sample",
    ))
    .unwrap();
    static ref FLOW_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("enervu_flow", "active energy flow directions (1 active, 0 inactive)",),
        &["flow"],
    )
    .unwrap();
    static ref DATA_UPDATES_COUNTER: IntCounter = register_int_counter!(opts!(
        "enervu_data_updates_total",
        "accepted snapshots since start",
    ))
    .unwrap();
}

/// Feed the engine status into the Prometheus registry.
pub fn record(status: &Status) {
    ENGINE_STATE_GAUGE.set(status.state.code());
    STALE_CYCLES_GAUGE.set(i64::from(status.stale_cycles));

    if let Some(snapshot) = &status.snapshot {
        GRID_POWER_GAUGE.set(snapshot.grid_power);
        LOAD_POWER_GAUGE.set(snapshot.load_power);
        PV_POWER_GAUGE.set(snapshot.pv_power);
        BATTERY_POWER_GAUGE.set(snapshot.battery.power);
        BATTERY_SOC_GAUGE.set(snapshot.battery.soc);
        BATTERY_STATUS_GAUGE.set(snapshot.battery.n_status.to_i64().unwrap_or_default());

        for (flow, active) in snapshot.flow.flags() {
            FLOW_GAUGE
                .with_label_values(&[flow])
                .set(if active { 1.0 } else { 0.0 });
        }
    }
}

pub fn count_update() {
    DATA_UPDATES_COUNTER.inc();
}

/// Read metrics from Prometheus exporter registry.
pub fn read() -> Result<String, Error> {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| Error::protocol(format!("Unable to encode metrics: {}", e)))?;
    String::from_utf8(buffer).map_err(|_| Error::protocol("Metrics are not valid UTF-8"))
}
