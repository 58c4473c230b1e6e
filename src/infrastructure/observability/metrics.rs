//! Meter factories for the membership rule engine.
//!
//! Every factory is a get-or-create against the passed registry: calling it
//! again with the same arguments returns a handle to the same series.
//!
//! # Cardinality
//!
//! Label values come from bounded domain enums, rule ids and the fixed
//! `stillingsprosent` buckets. `service`/`operation` default to `UKJENT`.

use super::error::Result;
use super::meter::{Counter, DistributionSummary, Gauge, Timer};
use super::registry::MeterRegistry;
use crate::domain::{Arsak, RegelId, Svar, Ytelse};

/// Label value used when the caller does not know the service or operation
pub const UKJENT: &str = "UKJENT";

/// Covers: 1 day to 10 years
const DAYS_BUCKETS: &[f64] = &[
    1.0, 7.0, 14.0, 30.0, 60.0, 90.0, 180.0, 365.0, 730.0, 1825.0, 3650.0,
];

/// Covers: 5ms to 30s
const CLIENT_LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

pub fn regel_counter(
    registry: &MeterRegistry,
    regel: &str,
    status: &str,
    ytelse: &str,
) -> Result<Counter> {
    Counter::builder("regel_calls_total")
        .tag("regel", regel)
        .tag("status", status)
        .tag("ytelse", ytelse)
        .description("counter for ja, nei, uavklart for regel calls")
        .register(registry)
}

/// Same as [`regel_counter`], under the name the push sink forwards
pub fn regel_influx_counter(
    registry: &MeterRegistry,
    regel: &str,
    status: &str,
    ytelse: &str,
) -> Result<Counter> {
    Counter::builder("regel_calls_influx")
        .tag("regelnummer", regel)
        .tag("status", status)
        .tag("ytelse", ytelse)
        .description("counter for ja, nei, uavklart for regler")
        .register(registry)
}

pub fn ytelse_counter(registry: &MeterRegistry, ytelse: &str) -> Result<Counter> {
    Counter::builder("ytelse_total")
        .tag("ytelse", ytelse)
        .description("counter for ytelser")
        .register(registry)
}

/// Interim tracking of rule 1.4 answers for unchanged employment
pub fn regel_uendret_counter_midlertidig(
    registry: &MeterRegistry,
    regel_id: &RegelId,
    svar: Svar,
    ytelse: Ytelse,
) -> Result<Counter> {
    Counter::builder("regel_uendret_arbeidsforhold")
        .tag("regel", regel_id.identifikator())
        .tag("svar", svar.name())
        .tag("ytelse", ytelse.name())
        .description("counter for ja eller nei for regel 1.4")
        .register(registry)
}

/// Part-time positions are counted per bucket, full-time ones in a series of their own
pub fn stillingsprosent_counter(
    registry: &MeterRegistry,
    stillingsprosent: f64,
    ytelse: &str,
) -> Result<Counter> {
    if stillingsprosent < 100.0 {
        Counter::builder("stillingsprosent_deltid")
            .tag("stillingsprosent", stillingsprosent_intervall(stillingsprosent))
            .tag("ytelse", ytelse)
            .description("counter for fordeling av stillingsprosenter")
            .register(registry)
    } else {
        Counter::builder("stillingsprosent_heltid")
            .tag("ytelse", ytelse)
            .description("counter for antall brukere med heltidsstilling")
            .register(registry)
    }
}

pub fn samlet_stillingsprosent_counter(
    registry: &MeterRegistry,
    stillingsprosent: f64,
    ytelse: &str,
) -> Result<Counter> {
    Counter::builder("stillingsprosent_samlet")
        .tag("stillingsprosent", stillingsprosent_intervall(stillingsprosent))
        .tag("ytelse", ytelse)
        .description("counter for fordeling av samlet stillingsprosent")
        .register(registry)
}

pub fn mer_enn_10_arbeidsforhold_counter(registry: &MeterRegistry, ytelse: Ytelse) -> Result<Counter> {
    Counter::builder("over_10_arbeidsforhold")
        .tag("ytelse", ytelse.name())
        .description("counter for brukere med flere enn 10 arbeidsforhold")
        .register(registry)
}

pub fn usammenhengende_arbeidsforhold_counter(
    registry: &MeterRegistry,
    ytelse: Ytelse,
) -> Result<Counter> {
    Counter::builder("usammenhengende_arbeidsforhold")
        .tag("ytelse", ytelse.name())
        .description("counter for usammenhengende arbeidsforhold")
        .register(registry)
}

pub fn har_ikke_arbeidsforhold_12_mnd_tilbake_counter(
    registry: &MeterRegistry,
    ytelse: Ytelse,
) -> Result<Counter> {
    Counter::builder("ingen_arbeidsforhold_fra_12_mnd_tilbake")
        .tag("ytelse", ytelse.name())
        .description("counter for brukere som ikke har arbeidsforhold som starter 12 mnd tilbake")
        .register(registry)
}

pub fn antall_dager_uten_arbeidsforhold(
    registry: &MeterRegistry,
    ytelse: Ytelse,
) -> Result<DistributionSummary> {
    DistributionSummary::builder("antall_dager_uten_arbeidsforhold")
        .tag("ytelse", ytelse.name())
        .buckets(DAYS_BUCKETS)
        .register(registry)
}

pub fn antall_dager_mellom_arbeidsforhold(
    registry: &MeterRegistry,
    ytelse: Ytelse,
) -> Result<DistributionSummary> {
    DistributionSummary::builder("antall_dager_mellom_arbeidsforhold")
        .tag("ytelse", ytelse.name())
        .buckets(DAYS_BUCKETS)
        .register(registry)
}

pub fn dekning_counter(registry: &MeterRegistry, dekning: &str, ytelse: &str) -> Result<Counter> {
    Counter::builder("dekningstyper")
        .tag("dekningstyper", dekning)
        .tag("ytelse", ytelse)
        .description("Ulike dekningskoder til brukere som har spurt tjenesten")
        .register(registry)
}

pub fn uavklart_paa_regel(registry: &MeterRegistry, arsak: &Arsak, ytelse: &str) -> Result<Counter> {
    Counter::builder("uavklart_for_regel")
        .tag("regel", arsak.to_string())
        .tag("ytelse", ytelse)
        .description("Regler som gir uavklart")
        .register(registry)
}

pub fn medl_counter(registry: &MeterRegistry) -> Result<Counter> {
    Counter::builder("medl_counter")
        .description("Registrerer dersom det finnes en periode i medl")
        .register(registry)
}

pub fn api_counter(registry: &MeterRegistry) -> Result<Counter> {
    Counter::builder("api_hit_counter")
        .description("Registers a counter for each hit to the api")
        .register(registry)
}

pub fn client_timer(
    registry: &MeterRegistry,
    service: Option<&str>,
    operation: Option<&str>,
) -> Result<Timer> {
    Timer::builder("client_calls_latency")
        .tag("service", service.unwrap_or(UKJENT))
        .tag("operation", operation.unwrap_or(UKJENT))
        .description("latency for calls to other services")
        .buckets(CLIENT_LATENCY_BUCKETS)
        .register(registry)
}

pub fn client_counter(
    registry: &MeterRegistry,
    service: Option<&str>,
    operation: Option<&str>,
    status: &str,
) -> Result<Counter> {
    Counter::builder("client_calls_total")
        .tag("service", service.unwrap_or(UKJENT))
        .tag("operation", operation.unwrap_or(UKJENT))
        .tag("status", status)
        .description("counter for failed or successful calls to other services")
        .register(registry)
}

/// Health of one backing client: 0 is OK, 1 signals an error
pub fn clients_gauge(registry: &MeterRegistry, client: &str) -> Result<Gauge> {
    Gauge::builder("health_check_clients_status")
        .tag("client", client)
        .description("Indikerer applikasjonens baksystemers helsestatus. 0 er OK, 1 indikerer feil.")
        .register(registry)
}

/// Overall health: 0 is OK, 1 signals an error
pub fn total_gauge(registry: &MeterRegistry) -> Result<Gauge> {
    Gauge::builder("health_check_status")
        .description("Indikerer applikasjonens helsestatus. 0 er OK, 1 indikerer feil.")
        .register(registry)
}

/// Bucket an employment percentage.
///
/// Decimals are truncated, not rounded: 24.9% does not qualify as a 25%
/// position when the rules are checked, so it must not be counted as one.
pub fn stillingsprosent_intervall(stillingsprosent: f64) -> &'static str {
    let heltall = stillingsprosent.trunc() as i64;
    match heltall {
        i64::MIN..=-1 => "N/A",
        0 => "0",
        1..=14 => "1 - 14",
        15..=24 => "15 - 24",
        25..=34 => "25 - 34",
        35..=44 => "35 - 44",
        45..=54 => "45 - 54",
        55..=64 => "55 - 64",
        65..=74 => "65 - 74",
        75..=84 => "75 - 84",
        85..=99 => "85 - 99",
        100 => "100",
        _ => "Over 100",
    }
}
