use std::path::Path;

use configparser::ini::Ini;

/// Per-simulation parameters. Loaded once, never mutated afterwards.
#[derive(Clone, Debug)]
pub struct Settings {
    pub particle_default_radius: f64,
    pub molten_particle_default_radius: f64,
    pub molten_particle_cooldown_time: i64,

    pub spring_default_stiffness: f64,
    pub spring_default_length: f64,
    pub spring_connection_threshold: f64,
    pub spring_disconnection_threshold: f64,

    pub relaxation_iteration_limit: usize,
    pub relaxation_convergence_limit: f64,

    pub heater_speed: f64,
    pub heater_size: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            particle_default_radius: 1.0,
            molten_particle_default_radius: 2.0,
            molten_particle_cooldown_time: 20,

            spring_default_stiffness: 0.01,
            spring_default_length: 5.5,
            spring_connection_threshold: 1.0,
            spring_disconnection_threshold: 1.3,

            relaxation_iteration_limit: 2000,
            relaxation_convergence_limit: 0.001,

            heater_speed: 2.0,
            heater_size: 20.0,
        }
    }
}

impl Settings {
    /// Reads settings from an INI file. Section and option names are
    /// case-insensitive. Any failure (missing file, missing option, bad
    /// value) is non-fatal: a warning is logged and every field keeps its
    /// default.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match Self::read_ini(path.as_ref()) {
            Ok(settings) => settings,
            Err(err) => {
                log::warn!(
                    "failed reading config file {}: {err}",
                    path.as_ref().display()
                );
                Self::default()
            }
        }
    }

    fn read_ini(path: &Path) -> Result<Self, String> {
        let mut ini = Ini::new();
        ini.load(path)?;

        Ok(Self {
            particle_default_radius: float(&ini, "particle", "defaultradius")?,
            molten_particle_default_radius: float(&ini, "particle", "moltendefaultradius")?,
            molten_particle_cooldown_time: int(&ini, "particle", "cooldowntime")?,

            spring_default_stiffness: float(&ini, "spring", "defaultstiffness")?,
            spring_default_length: float(&ini, "spring", "defaultlength")?,
            spring_connection_threshold: float(&ini, "spring", "connectionthreshold")?,
            spring_disconnection_threshold: float(&ini, "spring", "disconnectionthreshold")?,

            relaxation_iteration_limit: usize::try_from(int(&ini, "relaxation", "iterationlimit")?)
                .map_err(|_| "negative value for [relaxation] iterationlimit".to_string())?,
            relaxation_convergence_limit: float(&ini, "relaxation", "convergencelimit")?,

            heater_speed: float(&ini, "heater", "speed")?,
            heater_size: float(&ini, "heater", "size")?,
        })
    }
}

fn float(ini: &Ini, section: &str, option: &str) -> Result<f64, String> {
    ini.getfloat(section, option)?
        .ok_or_else(|| format!("missing option [{section}] {option}"))
}

fn int(ini: &Ini, section: &str, option: &str) -> Result<i64, String> {
    ini.getint(section, option)?
        .ok_or_else(|| format!("missing option [{section}] {option}"))
}
