use anyhow::Result;
use vistoria_contracts::inspection::Tier;

/// Outcome of a two-tier resolution: the value, the tier that produced it,
/// and the primary failure that forced degradation (when it did).
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub tier: Tier,
    pub degraded: Option<String>,
}

impl<T> Resolved<T> {
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Tries the primary tier, degrades to the fallback on ANY primary
/// failure. Each degradation happens at most once, immediately, with no
/// retry; a fallback failure propagates to the caller.
pub fn resolve<T>(
    primary: impl FnOnce() -> Result<T>,
    fallback: impl FnOnce() -> Result<T>,
) -> Result<Resolved<T>> {
    match primary() {
        Ok(value) => Ok(Resolved {
            value,
            tier: Tier::Primary,
            degraded: None,
        }),
        Err(primary_err) => {
            let value = fallback()?;
            Ok(Resolved {
                value,
                tier: Tier::Offline,
                degraded: Some(format!("{primary_err:#}")),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::bail;

    use super::*;

    #[test]
    fn primary_success_skips_fallback() {
        let resolved = resolve(
            || Ok("primário"),
            || -> Result<&str> { panic!("fallback must not run") },
        )
        .unwrap();
        assert_eq!(resolved.value, "primário");
        assert_eq!(resolved.tier, Tier::Primary);
        assert!(!resolved.is_degraded());
    }

    #[test]
    fn primary_failure_degrades_with_reason() {
        let resolved = resolve(|| bail!("quota esgotada"), || Ok("local")).unwrap();
        assert_eq!(resolved.value, "local");
        assert_eq!(resolved.tier, Tier::Offline);
        assert!(resolved.degraded.as_deref().unwrap().contains("quota esgotada"));
    }

    #[test]
    fn double_failure_propagates_fallback_error() {
        let err = resolve(
            || -> Result<&str> { bail!("primário fora") },
            || bail!("local quebrado"),
        )
        .err()
        .unwrap();
        assert!(format!("{err:#}").contains("local quebrado"));
    }
}
