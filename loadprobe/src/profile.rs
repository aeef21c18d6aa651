use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use loadprobe_core::{Endpoint, Expectation, Thresholds, default_endpoints, weighted_endpoints};
use serde::Deserialize;

use crate::cli::{RunArgs, TargetArgs};

pub(crate) const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub(crate) const DEFAULT_CONCURRENCY: u64 = 20;
pub(crate) const DEFAULT_REQUESTS: u64 = 500;

/// Optional YAML file describing the target. CLI flags win over every field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct Profile {
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout: Option<YamlDuration>,
    pub concurrency: Option<u64>,
    pub requests: Option<u64>,
    #[serde(default)]
    pub duration: Option<YamlDuration>,
    pub weighted: Option<bool>,
    #[serde(default)]
    pub endpoints: Vec<EndpointYaml>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct EndpointYaml {
    pub path: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub timeout: Option<YamlDuration>,
    #[serde(default)]
    pub expect: Option<ExpectYaml>,
}

fn default_weight() -> u32 {
    1
}

/// Exactly one of the fields must be set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct ExpectYaml {
    pub status: Option<u16>,
    pub json_field: Option<JsonFieldYaml>,
    pub body_contains: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct JsonFieldYaml {
    pub field: String,
    pub equals: String,
}

impl ExpectYaml {
    fn into_expectation(self) -> anyhow::Result<Expectation> {
        match (self.status, self.json_field, self.body_contains) {
            (Some(code), None, None) => Ok(Expectation::Status(code)),
            (None, Some(j), None) => Ok(Expectation::JsonField {
                field: j.field,
                equals: j.equals,
            }),
            (None, None, Some(text)) => Ok(Expectation::BodyContains(text)),
            (None, None, None) => Ok(Expectation::default()),
            _ => anyhow::bail!("`expect` must set only one of status, jsonField, bodyContains"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct YamlDuration(Duration);

impl YamlDuration {
    pub(crate) fn into_inner(self) -> Duration {
        self.0
    }
}

impl<'de> Deserialize<'de> for YamlDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl<'de> serde::de::Visitor<'de> for V {
            type Value = YamlDuration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("duration as string (e.g. 10s), integer seconds, or float seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(YamlDuration(Duration::from_secs(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if v <= 0 {
                    return Err(E::custom("duration must be positive"));
                }
                Ok(YamlDuration(Duration::from_secs(v as u64)))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if !v.is_finite() || v <= 0.0 {
                    return Err(E::custom("duration must be a positive, finite number"));
                }
                Ok(YamlDuration(Duration::from_secs_f64(v)))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let d = humantime::parse_duration(v).map_err(E::custom)?;
                Ok(YamlDuration(d))
            }
        }

        deserializer.deserialize_any(V)
    }
}

pub(crate) async fn load(path: &Path) -> anyhow::Result<Profile> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read profile: {}", path.display()))?;
    parse(&raw).with_context(|| format!("invalid profile: {}", path.display()))
}

pub(crate) fn parse(raw: &str) -> anyhow::Result<Profile> {
    if raw.trim().is_empty() {
        return Ok(Profile::default());
    }
    Ok(serde_yaml::from_str(raw)?)
}

/// How endpoints are picked for each unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Selection {
    Uniform,
    Weighted,
}

/// Everything about the target after merging flags, profile and defaults.
#[derive(Debug, Clone)]
pub(crate) struct Target {
    pub base_url: String,
    pub timeout: Duration,
    pub endpoints: Vec<Endpoint>,
    pub selection: Selection,
    pub seed: Option<u64>,
    pub thresholds: Thresholds,
}

pub(crate) fn resolve_target(args: &TargetArgs, profile: &Profile) -> anyhow::Result<Target> {
    let base_url = args
        .base_url
        .clone()
        .or_else(|| profile.base_url.clone())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    let timeout = args
        .timeout
        .or(profile.timeout.map(YamlDuration::into_inner))
        .unwrap_or(DEFAULT_TIMEOUT);
    if timeout.is_zero() {
        anyhow::bail!("timeout must be greater than zero");
    }

    let weighted = args.weighted || profile.weighted.unwrap_or(false);
    let selection = if weighted {
        Selection::Weighted
    } else {
        Selection::Uniform
    };

    let endpoints = if !args.endpoints.is_empty() {
        args.endpoints.iter().map(|p| Endpoint::new(p)).collect()
    } else if !profile.endpoints.is_empty() {
        profile
            .endpoints
            .iter()
            .cloned()
            .map(endpoint_from_yaml)
            .collect::<anyhow::Result<Vec<_>>>()?
    } else if weighted {
        weighted_endpoints()
    } else {
        default_endpoints()
    };

    for ep in &endpoints {
        if !ep.path.starts_with('/') {
            anyhow::bail!("endpoint path must start with '/': {}", ep.path);
        }
    }

    for (name, v) in [("--max-p95", args.max_p95), ("--max-p99", args.max_p99)] {
        if let Some(v) = v
            && !(v.is_finite() && v >= 0.0)
        {
            anyhow::bail!("{name} must be a non-negative number of milliseconds");
        }
    }

    Ok(Target {
        base_url,
        timeout,
        endpoints,
        selection,
        seed: args.seed,
        thresholds: Thresholds {
            max_p95_ms: args.max_p95,
            max_p99_ms: args.max_p99,
            max_error_rate: args.max_error_rate,
        },
    })
}

fn endpoint_from_yaml(y: EndpointYaml) -> anyhow::Result<Endpoint> {
    let path = y.path.clone();
    let expect = y
        .expect
        .unwrap_or_default()
        .into_expectation()
        .with_context(|| format!("endpoint {path}"))?;

    let mut ep = Endpoint::new(&y.path).with_weight(y.weight).expecting(expect);
    if let Some(t) = y.timeout {
        let t = t.into_inner();
        if t.is_zero() {
            anyhow::bail!("endpoint {path}: timeout must be greater than zero");
        }
        ep = ep.with_timeout(t);
    }
    Ok(ep)
}

/// Size and length of a `run`, after merging flags, profile and defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RunSize {
    pub concurrency: u64,
    pub requests: Option<u64>,
    pub duration: Option<Duration>,
}

/// A duration replaces the default request count unless a count was given explicitly.
pub(crate) fn resolve_run_size(args: &RunArgs, profile: &Profile) -> RunSize {
    let concurrency = args
        .concurrency
        .or(profile.concurrency)
        .unwrap_or(DEFAULT_CONCURRENCY);
    let duration = args
        .duration
        .or(profile.duration.map(YamlDuration::into_inner));
    let explicit_requests = args.requests.or(profile.requests);

    let requests = match (explicit_requests, duration) {
        (Some(n), _) => Some(n),
        (None, Some(_)) => None,
        (None, None) => Some(DEFAULT_REQUESTS),
    };

    RunSize {
        concurrency,
        requests,
        duration,
    }
}
