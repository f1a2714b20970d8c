use std::error::Error;
use std::fmt;

/// Prefix used by the data provider for composite regions
/// (world, continents, income groups) rather than countries.
pub const AGGREGATE_CODE_PREFIX: &str = "OWID_";

/// Check if a country code denotes a multi-country aggregate.
/// Aggregate rows are excluded from both input sources because they
/// would corrupt per-country percentages.
pub fn is_aggregate_code(code: &str) -> bool {
    code.starts_with(AGGREGATE_CODE_PREFIX)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyName,
    EmptyIsoCode,
    NegativePopulation { iso_code: String, population: i64 },
    NegativeVaccinated { iso_code: String, vaccinated: i64 },
    VaccinatedExceedsPopulation {
        iso_code: String,
        vaccinated: i64,
        population: i64,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyName => write!(f, "country name must not be empty"),
            ValidationError::EmptyIsoCode => write!(f, "ISO code must not be empty"),
            ValidationError::NegativePopulation {
                iso_code,
                population,
            } => write!(
                f,
                "population must not be negative (country {}, got {})",
                iso_code, population
            ),
            ValidationError::NegativeVaccinated {
                iso_code,
                vaccinated,
            } => write!(
                f,
                "vaccinated count must not be negative (country {}, got {})",
                iso_code, vaccinated
            ),
            ValidationError::VaccinatedExceedsPopulation {
                iso_code,
                vaccinated,
                population,
            } => write!(
                f,
                "vaccinated count can't be more than the population (country {}, {} > {})",
                iso_code, vaccinated, population
            ),
        }
    }
}

impl Error for ValidationError {}

/// A country joined from the population reference file and the
/// vaccination time series.
///
/// Fields are private so the `total_vaccinated <= population` invariant
/// cannot be bypassed: construction goes through [`Country::new`] and
/// updates through [`Country::set_total_vaccinated`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Country {
    name: String,
    iso_code: String,
    population: i64,
    total_vaccinated: i64,
}

impl Country {
    pub fn new(
        name: &str,
        iso_code: &str,
        population: i64,
        total_vaccinated: i64,
    ) -> Result<Self, ValidationError> {
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if iso_code.trim().is_empty() {
            return Err(ValidationError::EmptyIsoCode);
        }
        if population < 0 {
            return Err(ValidationError::NegativePopulation {
                iso_code: iso_code.to_string(),
                population,
            });
        }

        let mut country = Self {
            name: name.to_string(),
            iso_code: iso_code.to_string(),
            population,
            total_vaccinated: 0,
        };
        country.set_total_vaccinated(total_vaccinated)?;

        Ok(country)
    }

    /// Update the vaccinated count, rejecting values that violate the
    /// invariant. On rejection the previous value is kept.
    pub fn set_total_vaccinated(&mut self, count: i64) -> Result<(), ValidationError> {
        if count < 0 {
            return Err(ValidationError::NegativeVaccinated {
                iso_code: self.iso_code.clone(),
                vaccinated: count,
            });
        }
        if count > self.population {
            return Err(ValidationError::VaccinatedExceedsPopulation {
                iso_code: self.iso_code.clone(),
                vaccinated: count,
                population: self.population,
            });
        }

        self.total_vaccinated = count;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn iso_code(&self) -> &str {
        &self.iso_code
    }

    pub fn population(&self) -> i64 {
        self.population
    }

    pub fn total_vaccinated(&self) -> i64 {
        self.total_vaccinated
    }

    /// Share of the population fully vaccinated, 0.0 when the population
    /// itself is unknown (recorded as 0).
    pub fn vaccinated_percent(&self) -> f64 {
        if self.population > 0 {
            self.total_vaccinated as f64 / self.population as f64
        } else {
            0.0
        }
    }
}
