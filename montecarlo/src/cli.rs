use crate::{
    analyzer::{FaceCounts, ResultAnalyzer, TupleCounts},
    default_rng,
    die::WeightedDie,
    game::{MultiDieGame, ResultFormat, Results},
    parse::DieSpec,
    seeded_rng, stats, DefaultRng,
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tabular::{row, Row, Table};
use trice::Instant;

const DEFAULT_ROLLS: usize = 10;
const DEFAULT_TOP: usize = 10;

///////////////////////////
// String parser helpers //
///////////////////////////

fn parse_req<T>(label: &'static str, s: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    T::from_str(s).map_err(|err| format!("invalid {label}: {err}"))
}

fn parse_opt<T>(label: &'static str, opt_s: Option<&str>) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    opt_s
        .map(T::from_str)
        .transpose()
        .map_err(|err| format!("invalid {label}: {err}"))
}

fn parse_dice(dice: &[String]) -> Result<Vec<DieSpec>, String> {
    if dice.is_empty() {
        return Err("at least one die is required".to_owned());
    }
    dice.iter().map(|s| parse_req("die", s)).collect()
}

fn make_rng(seed: Option<u64>) -> DefaultRng {
    seed.map_or_else(default_rng, seeded_rng)
}

fn seed_label(seed: Option<u64>) -> String {
    seed.map_or_else(|| "(entropy)".to_owned(), |seed| seed.to_string())
}

//////////////////////
// CLI Args Wrapper //
//////////////////////

pub struct Args(pico_args::Arguments);

impl Args {
    pub fn new(inner: pico_args::Arguments) -> Self {
        Self(inner)
    }

    fn subcommand(&mut self) -> Result<Option<String>, String> {
        self.0.subcommand().map_err(|err| err.to_string())
    }

    fn opt_value(&mut self, keys: impl Into<pico_args::Keys>) -> Result<Option<String>, String> {
        self.0
            .opt_value_from_fn(keys, |s| Result::<_, pico_args::Error>::Ok(s.to_owned()))
            .map_err(|err| err.to_string())
    }

    fn free_value(&mut self) -> Result<String, String> {
        self.0
            .free_from_fn(|s| Result::<_, pico_args::Error>::Ok(s.to_owned()))
            .map_err(|err| err.to_string())
    }

    fn free_values(&mut self) -> Result<Vec<String>, String> {
        let mut values = Vec::new();
        while let Some(value) = self
            .0
            .opt_free_from_fn(|s| Result::<_, pico_args::Error>::Ok(s.to_owned()))
            .map_err(|err| err.to_string())?
        {
            values.push(value);
        }
        Ok(values)
    }

    fn expect_finished(self) -> Result<(), String> {
        let remaining = self.0.finish();
        if !remaining.is_empty() {
            Err(format!("unexpected arguments left: '{:?}'", remaining))
        } else {
            Ok(())
        }
    }

    fn maybe_help(&mut self, usage: &str) {
        if self.0.contains(["-h", "--help"]) {
            print!("{}", usage);
            std::process::exit(0);
        }
    }
}

/////////////
// Metrics //
/////////////

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metrics(pub Vec<(String, String)>);

impl Metrics {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, label: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.push((label.into(), value.into()));
        self
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new("{:>}  {:<}");

        for (label, value) in &self.0 {
            table.add_row(row!(label, value));
        }

        table
    }
}

///////////////////
// Command trait //
///////////////////

pub trait Command: Sized {
    const USAGE: &'static str;

    type Output: fmt::Display;

    fn try_from_cli_args(args: Args) -> Result<Self, String>;
    fn run(self) -> Result<Self::Output, String>;
}

///////////////////
// Table helpers //
///////////////////

fn row_from_cells(cells: impl Iterator<Item = String>) -> Row {
    let mut row = Row::new();
    for cell in cells {
        row.add_cell(cell);
    }
    row
}

/// A right-aligned table spec with `ncols` columns.
fn table_spec(ncols: usize) -> String {
    vec!["{:>}"; ncols].join("  ")
}

fn tuple_label(tuple: &[String]) -> String {
    format!("({})", tuple.join(", "))
}

fn counts_table(label: &str, counts: &TupleCounts<String>, top: usize) -> Table {
    let mut table = Table::new("{:<}  {:>}").with_row(row!(label, "count"));

    let len = counts.len();
    for (tuple, count) in counts.iter().take(top) {
        table.add_row(row!(tuple_label(tuple), count));
    }

    // we only show the top few rows, but display '...' to show that there
    // were more.
    if len > top {
        table.add_row(row!("...", format!("(+ {})", len - top)));
    }

    table
}

fn face_counts_table(counts: &FaceCounts<String>, top: usize) -> Table {
    let (nrolls, nfaces) = counts.shape();
    let mut table = Table::new(&table_spec(nfaces + 1)).with_row(row_from_cells(
        std::iter::once("roll".to_owned()).chain(counts.faces().iter().cloned()),
    ));

    for roll in 0..nrolls.min(top) {
        table.add_row(row_from_cells(
            std::iter::once(roll.to_string())
                .chain(
                    counts
                        .row(roll)
                        .into_iter()
                        .flatten()
                        .map(|count| count.to_string()),
                ),
        ));
    }

    if nrolls > top {
        let mut row = row_from_cells(std::iter::once("...".to_owned()));
        row.add_cell(format!("(+ {})", nrolls - top));
        for _ in 1..nfaces {
            row.add_cell("");
        }
        table.add_row(row);
    }

    table
}

fn results_table(results: &Results<String>) -> Table {
    match results {
        Results::Wide(wide) => {
            let mut table = Table::new(&table_spec(wide.ndice() + 1)).with_row(row_from_cells(
                std::iter::once("roll".to_owned())
                    .chain((0..wide.ndice()).map(|die| format!("die {die}"))),
            ));
            for (roll, outcomes) in wide.rows().enumerate() {
                table.add_row(row_from_cells(
                    std::iter::once(roll.to_string()).chain(outcomes.iter().cloned()),
                ));
            }
            table
        }
        Results::Narrow(narrow) => {
            let mut table = Table::new("{:>}  {:>}  {:>}").with_row(row!("roll", "die", "outcome"));
            for cell in narrow.iter() {
                table.add_row(row!(cell.roll, cell.die, &cell.outcome));
            }
            table
        }
    }
}

/////////////////
// RollCommand //
/////////////////

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RollCommand {
    die: DieSpec,
    times: usize,
    seed: Option<u64>,
}

impl RollCommand {
    pub fn try_from_str_args(
        times: Option<&str>,
        seed: Option<&str>,
        die: &str,
    ) -> Result<Self, String> {
        Ok(Self {
            die: parse_req("die", die)?,
            times: parse_opt("times", times)?.unwrap_or(DEFAULT_ROLLS),
            seed: parse_opt("seed", seed)?,
        })
    }
}

impl Command for RollCommand {
    const USAGE: &'static str = "\
montecarlo roll - roll a single weighted die and tally the faces

USAGE:
    montecarlo roll [option ...] <die>

EXAMPLES:
    montecarlo roll d6
    montecarlo roll -n 1000 --seed 42 [1,2,3,4,5,6:5]
    montecarlo roll [H,T:0.5]

OPTIONS:
    · --times / -n n (default: 10)
      The number of times to roll the die.

    · --seed s (default: from entropy)
      Seed the RNG for reproducible rolls.
";

    type Output = RollCommandOutput;

    fn try_from_cli_args(mut args: Args) -> Result<Self, String> {
        args.maybe_help(Self::USAGE);

        let times = args.opt_value(["-n", "--times"])?;
        let seed = args.opt_value("--seed")?;
        let die = args.free_value()?;
        args.expect_finished()?;

        Self::try_from_str_args(times.as_deref(), seed.as_deref(), &die)
    }

    fn run(self) -> Result<Self::Output, String> {
        let die = self.die.to_die()?;
        let mut rng = make_rng(self.seed);

        let start_time = Instant::now();
        let outcomes = die
            .roll(&mut rng, self.times)
            .map_err(|err| err.to_string())?;
        let roll_duration = start_time.elapsed();

        let pvalue = stats::fit_pvalue(&die, &outcomes).map_err(|err| err.to_string())?;

        let mut metrics = Metrics::new();
        metrics.push("rolls", self.times.to_string());
        metrics.push("seed", seed_label(self.seed));
        metrics.push("roll duration", format!("{:.2?}", roll_duration));
        metrics.push("fit p-value", format!("{:0.4}", pvalue));

        Ok(RollCommandOutput {
            die,
            outcomes,
            metrics,
        })
    }
}

#[derive(Clone, Debug)]
pub struct RollCommandOutput {
    pub die: WeightedDie<String>,
    pub outcomes: Vec<String>,
    pub metrics: Metrics,
}

impl RollCommandOutput {
    fn to_table(&self) -> Table {
        let mut table =
            Table::new("{:>}  {:>}  {:>}  {:>}").with_row(row!("face", "weight", "count", "freq"));

        let n = self.outcomes.len();
        for (face, weight) in self.die.show() {
            let count = self.outcomes.iter().filter(|&outcome| *outcome == face).count();
            let freq = if n > 0 { (count as f64) / (n as f64) } else { 0.0 };
            table.add_row(row!(face, weight, count, format!("{:0.3}", freq)));
        }

        table
    }
}

impl fmt::Display for RollCommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\n{}\n{}", self.to_table(), self.metrics.to_table())
    }
}

/////////////////
// PlayCommand //
/////////////////

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayCommand {
    dice: Vec<DieSpec>,
    rolls: usize,
    format: ResultFormat,
    seed: Option<u64>,
}

impl PlayCommand {
    pub fn try_from_str_args(
        rolls: Option<&str>,
        format: Option<&str>,
        seed: Option<&str>,
        dice: &[String],
    ) -> Result<Self, String> {
        Ok(Self {
            dice: parse_dice(dice)?,
            rolls: parse_opt("rolls", rolls)?.unwrap_or(DEFAULT_ROLLS),
            format: parse_opt("format", format)?.unwrap_or_default(),
            seed: parse_opt("seed", seed)?,
        })
    }
}

impl Command for PlayCommand {
    const USAGE: &'static str = "\
montecarlo play - roll several dice together and show the outcomes

USAGE:
    montecarlo play [option ...] <die> <die> ...

EXAMPLES:
    montecarlo play d6 d6
    montecarlo play -n 5 -f narrow d6 [1,2,3,4,5,6:5]

OPTIONS:
    · --rolls / -n n (default: 10)
      The number of times to roll every die.

    · --format / -f wide|narrow (default: wide)
      `wide` shows one row per roll and one column per die. `narrow` shows
      one row per (roll, die) pair.

    · --seed s (default: from entropy)
      Seed the RNG for reproducible rolls.
";

    type Output = PlayCommandOutput;

    fn try_from_cli_args(mut args: Args) -> Result<Self, String> {
        args.maybe_help(Self::USAGE);

        let rolls = args.opt_value(["-n", "--rolls"])?;
        let format = args.opt_value(["-f", "--format"])?;
        let seed = args.opt_value("--seed")?;
        let dice = args.free_values()?;
        args.expect_finished()?;

        Self::try_from_str_args(rolls.as_deref(), format.as_deref(), seed.as_deref(), &dice)
    }

    fn run(self) -> Result<Self::Output, String> {
        let dice = self
            .dice
            .iter()
            .map(DieSpec::to_die)
            .collect::<Result<Vec<_>, _>>()?;
        let mut rng = make_rng(self.seed);

        let mut game = MultiDieGame::new(&dice);

        let start_time = Instant::now();
        game.play(&mut rng, self.rolls)
            .map_err(|err| err.to_string())?;
        let play_duration = start_time.elapsed();

        let results = game
            .show_results(self.format)
            .map_err(|err| err.to_string())?;

        let mut metrics = Metrics::new();
        metrics.push("rolls", self.rolls.to_string());
        metrics.push("dice", dice.len().to_string());
        metrics.push("seed", seed_label(self.seed));
        metrics.push("play duration", format!("{:.2?}", play_duration));

        Ok(PlayCommandOutput { results, metrics })
    }
}

#[derive(Clone)]
pub struct PlayCommandOutput {
    pub results: Results<String>,
    pub metrics: Metrics,
}

impl fmt::Display for PlayCommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\n{}\n{}",
            results_table(&self.results),
            self.metrics.to_table()
        )
    }
}

////////////////////
// AnalyzeCommand //
////////////////////

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalyzeCommand {
    dice: Vec<DieSpec>,
    rolls: usize,
    top: usize,
    seed: Option<u64>,
}

impl AnalyzeCommand {
    pub fn try_from_str_args(
        rolls: Option<&str>,
        top: Option<&str>,
        seed: Option<&str>,
        dice: &[String],
    ) -> Result<Self, String> {
        Ok(Self {
            dice: parse_dice(dice)?,
            rolls: parse_opt("rolls", rolls)?.unwrap_or(DEFAULT_ROLLS),
            top: parse_opt("top", top)?.unwrap_or(DEFAULT_TOP),
            seed: parse_opt("seed", seed)?,
        })
    }
}

impl Command for AnalyzeCommand {
    const USAGE: &'static str = "\
montecarlo analyze - play a game and summarize the outcomes

USAGE:
    montecarlo analyze [option ...] <die> <die> ...

EXAMPLES:
    montecarlo analyze -n 1000 d6 d6
    montecarlo analyze -n 500 --seed 7 [H,T] [H,T] [H,T:3]

OPTIONS:
    · --rolls / -n n (default: 10)
      The number of times to roll every die.

    · --top / -t n (default: 10)
      The number of rows to show in each table.

    · --seed s (default: from entropy)
      Seed the RNG for reproducible rolls.
";

    type Output = AnalyzeCommandOutput;

    fn try_from_cli_args(mut args: Args) -> Result<Self, String> {
        args.maybe_help(Self::USAGE);

        let rolls = args.opt_value(["-n", "--rolls"])?;
        let top = args.opt_value(["-t", "--top"])?;
        let seed = args.opt_value("--seed")?;
        let dice = args.free_values()?;
        args.expect_finished()?;

        Self::try_from_str_args(rolls.as_deref(), top.as_deref(), seed.as_deref(), &dice)
    }

    fn run(self) -> Result<Self::Output, String> {
        let dice = self
            .dice
            .iter()
            .map(DieSpec::to_die)
            .collect::<Result<Vec<_>, _>>()?;
        let mut rng = make_rng(self.seed);

        let mut game = MultiDieGame::new(&dice);

        let start_time = Instant::now();
        game.play(&mut rng, self.rolls)
            .map_err(|err| err.to_string())?;
        let analyzer = ResultAnalyzer::new(&game).map_err(|err| err.to_string())?;

        let jackpots = analyzer.jackpot();
        let face_counts = analyzer.face_counts_per_roll();
        let combos = analyzer.combo_counts();
        let permutations = analyzer.permutation_counts();
        let analyze_duration = start_time.elapsed();

        let mut metrics = Metrics::new();
        metrics.push("rolls", self.rolls.to_string());
        metrics.push("dice", dice.len().to_string());
        metrics.push("seed", seed_label(self.seed));
        metrics.push("jackpots", jackpots.to_string());
        metrics.push("distinct combos", combos.len().to_string());
        metrics.push("distinct permutations", permutations.len().to_string());
        metrics.push("duration", format!("{:.2?}", analyze_duration));

        Ok(AnalyzeCommandOutput {
            top: self.top,
            face_counts,
            combos,
            permutations,
            metrics,
        })
    }
}

#[derive(Clone)]
pub struct AnalyzeCommandOutput {
    pub top: usize,
    pub face_counts: FaceCounts<String>,
    pub combos: TupleCounts<String>,
    pub permutations: TupleCounts<String>,
    pub metrics: Metrics,
}

impl fmt::Display for AnalyzeCommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\n{}\n{}\n{}\n{}",
            face_counts_table(&self.face_counts, self.top),
            counts_table("combo", &self.combos, self.top),
            counts_table("permutation", &self.permutations, self.top),
            self.metrics.to_table()
        )
    }
}

/////////////////
// BaseCommand //
/////////////////

#[derive(Debug)]
pub enum BaseCommand {
    Roll(RollCommand),
    Play(PlayCommand),
    Analyze(AnalyzeCommand),
}

impl Command for BaseCommand {
    const USAGE: &'static str = "\
montecarlo - roll weighted dice and tabulate the outcomes

USAGE:
    montecarlo [option ...] <subcommand>

SUBCOMMANDS:
    · montecarlo roll - roll a single weighted die and tally the faces
    · montecarlo play - roll several dice together and show the outcomes
    · montecarlo analyze - play a game and summarize the outcomes

Set RUST_LOG=debug for timing and statistics logs.
";

    type Output = String;

    fn try_from_cli_args(mut args: Args) -> Result<Self, String> {
        let maybe_subcommand = args.subcommand()?;

        match maybe_subcommand.as_deref() {
            Some("roll") => Ok(Self::Roll(RollCommand::try_from_cli_args(args)?)),
            Some("play") => Ok(Self::Play(PlayCommand::try_from_cli_args(args)?)),
            Some("analyze") => Ok(Self::Analyze(AnalyzeCommand::try_from_cli_args(args)?)),
            Some(command) => Err(format!("'{}' is not a recognized command", command)),
            None => {
                args.maybe_help(Self::USAGE);
                Err("no subcommand specified".to_string())
            }
        }
    }

    fn run(self) -> Result<String, String> {
        match self {
            Self::Roll(cmd) => cmd.run().map(|out| out.to_string()),
            Self::Play(cmd) => cmd.run().map(|out| out.to_string()),
            Self::Analyze(cmd) => cmd.run().map(|out| out.to_string()),
        }
    }
}

///////////
// Tests //
///////////
