//! Write a synthetic measurement series for trying out `resofit`.
//!
//! Lock-in sweeps use the eight-column layout `f X _ Y _ R _ φ`; FIDs use
//! `t signal`. Both carry `Curr_<n>_uA` and a timestamp in the file name.

use std::f64::consts::PI;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use resofit::fit::lorentz::{LinearBackground, Lorentzian};

#[derive(Debug, Parser)]
#[command(about = "Generate synthetic lock-in sweeps and FIDs")]
struct Args {
    /// Output directory, created if missing
    #[arg(short, long, default_value = "sample_data")]
    out: PathBuf,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Standard deviation of the additive noise
    #[arg(long, default_value_t = 0.5)]
    noise: f64,
}

/// Drive currents in µA; the resonance moves with the current.
const CURRENTS: [i32; 5] = [-200, -100, 0, 100, 200];

fn resonance_for(current_ua: i32) -> Lorentzian {
    Lorentzian {
        f0: 5.0 + 0.002 * current_ua as f64,
        amplitude: 100.0,
        gamma: 0.2,
        phase: 0.3,
    }
}

fn file_name(prefix: &str, current_ua: i32, index: u32) -> String {
    // day_month_year_hh_mm_ss, one file every ten minutes
    let minutes = 10 * index;
    format!(
        "{prefix}_Curr_{current_ua}_uA_14_03_2024_{:02}_{:02}_00.dat",
        9 + minutes / 60,
        minutes % 60
    )
}

fn sweep_text(
    lorentz: &Lorentzian,
    background: &LinearBackground,
    noise: &Normal<f64>,
    rng: &mut StdRng,
) -> Result<String> {
    let mut text = String::from("# f X - Y - R - phi\n");
    for i in 0..400 {
        let f = 3.0 + i as f64 * 0.01;
        let z = lorentz.eval(f) + background.eval(f);
        let x = z.re + noise.sample(rng);
        let y = z.im + noise.sample(rng);
        writeln!(
            text,
            "{f:.4} {x:.6} 0 {y:.6} 0 {:.6} 0 {:.6}",
            x.hypot(y),
            y.atan2(x)
        )?;
    }
    Ok(text)
}

fn fid_text(lorentz: &Lorentzian, noise: &Normal<f64>, rng: &mut StdRng) -> Result<String> {
    let dt = 1e-3;
    let mut text = String::from("# t signal\n");
    for i in 0..8192 {
        let t = i as f64 * dt;
        let decay = (-2.0 * PI * lorentz.gamma * t).exp();
        let s = (2.0 * PI * lorentz.f0 * t + lorentz.phase).cos() * decay + 0.01 * noise.sample(rng);
        writeln!(text, "{t:.6} {s:.8}")?;
    }
    Ok(text)
}

fn write(dir: &Path, name: &str, text: &str) -> Result<()> {
    let path = dir.join(name);
    std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut rng = StdRng::seed_from_u64(args.seed);
    let noise = Normal::new(0.0, args.noise).context("noise must be finite and non-negative")?;

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("creating {}", args.out.display()))?;
    let background = LinearBackground {
        slope_re: 0.5,
        offset_re: -3.0,
        slope_im: -0.2,
        offset_im: 1.5,
    };

    for (index, &current) in CURRENTS.iter().enumerate() {
        let lorentz = resonance_for(current);
        write(
            &args.out,
            &file_name("sweep", current, index as u32),
            &sweep_text(&lorentz, &background, &noise, &mut rng)?,
        )?;
    }

    let fid_dir = args.out.join("fid");
    std::fs::create_dir_all(&fid_dir)
        .with_context(|| format!("creating {}", fid_dir.display()))?;
    for (index, &current) in CURRENTS.iter().enumerate() {
        let lorentz = Lorentzian {
            f0: 20.0 + 0.01 * current as f64,
            ..resonance_for(current)
        };
        write(
            &fid_dir,
            &file_name("fid", current, index as u32),
            &fid_text(&lorentz, &noise, &mut rng)?,
        )?;
    }

    println!(
        "Wrote {} sweeps to {} and {} FIDs to {}",
        CURRENTS.len(),
        args.out.display(),
        CURRENTS.len(),
        fid_dir.display()
    );
    Ok(())
}
