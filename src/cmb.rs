use crate::{
    error::{Error, Result},
    map::{is_valid, SkyMap},
    ud_grade::ud_grade,
};

pub const PLANCK_H: f64 = 6.626_070_15e-34;
pub const BOLTZMANN_K: f64 = 1.380_649e-23;
pub const T_CMB: f64 = 2.7255;

/// dT_RJ / dT_CMB at `freq_ghz`.
pub fn thermo_to_rj(freq_ghz: f64) -> f64 {
    let x = PLANCK_H * freq_ghz * 1e9 / (BOLTZMANN_K * T_CMB);
    x * x * x.exp() / (x.exp_m1() * x.exp_m1())
}

/// Subtracts a CMB template given in thermodynamic units from a map in
/// Rayleigh-Jeans brightness temperature. Pixels the template does not cover
/// become NaN.
pub fn remove_cmb(map: &SkyMap, cmb_thermo: &SkyMap, freq_ghz: f64) -> Result<SkyMap> {
    let cmb = ud_grade(&cmb_thermo.to_order(map.order())?, map.nside())?;
    if cmb.npix() != map.npix() {
        return Err(Error::ShapeMismatch {
            expected: (map.npix(), 1),
            found: (cmb.npix(), 1),
        });
    }
    let factor = thermo_to_rj(freq_ghz);
    map.with_values(
        map.values()
            .iter()
            .zip(cmb.values())
            .map(|(&x, &c)| {
                if c.is_finite() && is_valid(x) {
                    x - factor * c
                } else {
                    f64::NAN
                }
            })
            .collect(),
    )
}
