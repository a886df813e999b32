use crate::{die::WeightedDie, Error, Face, Result};
use ndarray::{Array2, ArrayView1};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

//////////////////
// ResultFormat //
//////////////////

/// The shape [`MultiDieGame::show_results`] returns the last play in.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultFormat {
    /// One row per roll, one column per die.
    #[default]
    Wide,
    /// One row per (roll, die) pair, with columns `{die, outcome}`.
    Narrow,
}

impl FromStr for ResultFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "wide" => Ok(Self::Wide),
            "narrow" => Ok(Self::Narrow),
            _ => Err(Error::InvalidFormat(s.to_owned())),
        }
    }
}

impl fmt::Display for ResultFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Wide => "wide",
            Self::Narrow => "narrow",
        };
        f.write_str(s)
    }
}

/////////////////
// WideResults //
/////////////////

/// The outcomes of one play: `table[[roll, die]]` is the face die `die` showed
/// on roll `roll`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WideResults<F> {
    table: Array2<F>,
}

impl<F: Face> WideResults<F> {
    /// Align per-die outcome columns by roll index. Every column must hold
    /// exactly `nrolls` outcomes.
    fn from_columns(nrolls: usize, columns: &[Vec<F>]) -> Self {
        debug_assert!(columns.iter().all(|col| col.len() == nrolls));

        let table = Array2::from_shape_fn((nrolls, columns.len()), |(roll, die)| {
            columns[die][roll].clone()
        });
        Self { table }
    }

    /// Build a table from recorded rolls, one inner `Vec` per roll holding each
    /// die's outcome in die order. All rolls must have the same number of dice.
    pub fn from_rows(rows: Vec<Vec<F>>) -> Result<Self> {
        let ndice = rows.first().map_or(0, Vec::len);

        if let Some(roll) = rows.iter().position(|row| row.len() != ndice) {
            return Err(Error::InvalidArgument(format!(
                "roll {roll} has {} outcomes, expected {ndice}",
                rows[roll].len()
            )));
        }

        let nrolls = rows.len();
        let flat = rows.into_iter().flatten().collect::<Vec<_>>();
        let table = Array2::from_shape_vec((nrolls, ndice), flat)
            .map_err(|err| Error::InvalidArgument(err.to_string()))?;
        Ok(Self { table })
    }

    /// `(rolls, dice)`
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.table.dim()
    }

    #[inline]
    pub fn nrolls(&self) -> usize {
        self.table.nrows()
    }

    #[inline]
    pub fn ndice(&self) -> usize {
        self.table.ncols()
    }

    #[inline]
    pub fn get(&self, roll: usize, die: usize) -> Option<&F> {
        self.table.get((roll, die))
    }

    /// Each roll's outcomes, in roll order.
    pub fn rows(&self) -> impl Iterator<Item = ArrayView1<'_, F>> + '_ {
        self.table.rows().into_iter()
    }

    /// All of one die's outcomes, in roll order.
    pub fn column(&self, die: usize) -> ArrayView1<'_, F> {
        self.table.column(die)
    }

    #[inline]
    pub fn as_array(&self) -> &Array2<F> {
        &self.table
    }

    /// Melt into the narrow form: all of die 0's rolls, then die 1's, etc.
    pub fn to_narrow(&self) -> NarrowResults<F> {
        let rows = self
            .table
            .columns()
            .into_iter()
            .enumerate()
            .flat_map(|(die, column)| {
                column
                    .into_iter()
                    .enumerate()
                    .map(move |(roll, outcome)| NarrowRow {
                        roll,
                        die,
                        outcome: outcome.clone(),
                    })
            })
            .collect();

        NarrowResults { rows }
    }
}

///////////////////
// NarrowResults //
///////////////////

/// One (roll, die) cell of a play. `roll` is the row label; the table's two
/// columns are `die` and `outcome`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrowRow<F> {
    pub roll: usize,
    pub die: usize,
    pub outcome: F,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrowResults<F> {
    rows: Vec<NarrowRow<F>>,
}

impl<F> NarrowResults<F> {
    /// `(rolls * dice, 2)`
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), 2)
    }

    #[inline]
    pub fn rows(&self) -> &[NarrowRow<F>] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NarrowRow<F>> {
        self.rows.iter()
    }
}

/////////////
// Results //
/////////////

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Results<F> {
    Wide(WideResults<F>),
    Narrow(NarrowResults<F>),
}

impl<F: Face> Results<F> {
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Self::Wide(wide) => wide.shape(),
            Self::Narrow(narrow) => narrow.shape(),
        }
    }

    pub fn format(&self) -> ResultFormat {
        match self {
            Self::Wide(_) => ResultFormat::Wide,
            Self::Narrow(_) => ResultFormat::Narrow,
        }
    }

    pub fn into_wide(self) -> Option<WideResults<F>> {
        match self {
            Self::Wide(wide) => Some(wide),
            Self::Narrow(_) => None,
        }
    }

    pub fn into_narrow(self) -> Option<NarrowResults<F>> {
        match self {
            Self::Wide(_) => None,
            Self::Narrow(narrow) => Some(narrow),
        }
    }
}

//////////////////
// MultiDieGame //
//////////////////

/// Rolls a fixed, ordered list of dice together. The game borrows its dice and
/// reads their weights when it plays; it keeps only the most recent play.
#[derive(Clone, Debug)]
pub struct MultiDieGame<'a, F> {
    dice: Vec<&'a WeightedDie<F>>,
    results: Option<WideResults<F>>,
}

impl<'a, F: Face> MultiDieGame<'a, F> {
    /// Dice may have different faces and different numbers of faces, and the
    /// same die may appear more than once.
    pub fn new(dice: impl IntoIterator<Item = &'a WeightedDie<F>>) -> Self {
        Self {
            dice: dice.into_iter().collect(),
            results: None,
        }
    }

    #[inline]
    pub fn dice(&self) -> &[&'a WeightedDie<F>] {
        &self.dice
    }

    #[inline]
    pub fn num_dice(&self) -> usize {
        self.dice.len()
    }

    #[inline]
    pub fn is_played(&self) -> bool {
        self.results.is_some()
    }

    /// The most recent play, if any.
    #[inline]
    pub fn results(&self) -> Option<&WideResults<F>> {
        self.results.as_ref()
    }

    /// Roll every die `rolls` times and replace the stored results. If any die
    /// fails to roll, the previous results are left as they were.
    pub fn play<R: Rng + ?Sized>(&mut self, rng: &mut R, rolls: usize) -> Result<()> {
        let results = time!("play", {
            let columns = self
                .dice
                .iter()
                .map(|die| die.roll(rng, rolls))
                .collect::<Result<Vec<_>>>()?;

            WideResults::from_columns(rolls, &columns)
        });

        log::debug!("play: rolls: {rolls}, dice: {}", self.num_dice());

        self.results = Some(results);
        Ok(())
    }

    /// A copy of the most recent play, in the requested shape.
    pub fn show_results(&self, format: ResultFormat) -> Result<Results<F>> {
        let wide = self.results.as_ref().ok_or(Error::NotPlayed)?;

        Ok(match format {
            ResultFormat::Wide => Results::Wide(wide.clone()),
            ResultFormat::Narrow => Results::Narrow(wide.to_narrow()),
        })
    }
}

///////////
// Tests //
///////////

#[cfg(test)]
mod test {
    use super::*;
    use crate::die::prop::{arb_rng, small_rng};
    use claim::assert_ok;
    use proptest::prelude::*;

    fn d6() -> WeightedDie<u8> {
        WeightedDie::new(1..=6).unwrap()
    }

    fn fixed(faces: impl IntoIterator<Item = u8>, face: u8) -> WeightedDie<u8> {
        let mut die = WeightedDie::new(faces).unwrap();
        for f in die.faces().to_vec() {
            if f != face {
                die.set_weight(&f, 0.0).unwrap();
            }
        }
        die
    }

    #[test]
    fn test_result_format_from_str() {
        assert_eq!(Ok(ResultFormat::Wide), "wide".parse::<ResultFormat>());
        assert_eq!(Ok(ResultFormat::Narrow), "narrow".parse::<ResultFormat>());
        assert_eq!(
            Err(Error::InvalidFormat("long".to_owned())),
            "long".parse::<ResultFormat>()
        );
        assert_eq!(
            Err(Error::InvalidFormat("Wide".to_owned())),
            "Wide".parse::<ResultFormat>()
        );
        assert_eq!(ResultFormat::Wide, ResultFormat::default());
        assert_eq!("narrow", ResultFormat::Narrow.to_string());
    }

    #[test]
    fn test_show_results_before_play() {
        let die = d6();
        let game = MultiDieGame::new([&die, &die]);
        assert!(!game.is_played());
        assert_eq!(Err(Error::NotPlayed), game.show_results(ResultFormat::Wide));
        assert_eq!(Err(Error::NotPlayed), game.show_results(ResultFormat::Narrow));
    }

    #[test]
    fn test_play_shape() {
        let mut rng = small_rng(7);
        let (die1, die2) = (d6(), d6());
        let mut game = MultiDieGame::new([&die1, &die2]);

        assert_ok!(game.play(&mut rng, 10));
        assert!(game.is_played());

        let wide = game.show_results(ResultFormat::Wide).unwrap();
        assert_eq!((10, 2), wide.shape());
        assert_eq!(ResultFormat::Wide, wide.format());

        let narrow = game.show_results(ResultFormat::Narrow).unwrap();
        assert_eq!((20, 2), narrow.shape());
        assert_eq!(ResultFormat::Narrow, narrow.format());
    }

    #[test]
    fn test_play_mixed_dice() {
        let mut rng = small_rng(8);
        let coin = WeightedDie::new([0, 1]).unwrap();
        let d20 = WeightedDie::new(1..=20).unwrap();
        let mut game = MultiDieGame::new([&coin, &d20, &coin]);
        assert_eq!(3, game.num_dice());
        assert_eq!(&d20, game.dice()[1]);

        game.play(&mut rng, 25).unwrap();
        let wide = game.results().unwrap();

        assert_eq!((25, 3), wide.shape());
        assert!(wide.column(0).iter().all(|f| coin.faces().contains(f)));
        assert!(wide.column(1).iter().all(|f| d20.faces().contains(f)));
        assert!(wide.column(2).iter().all(|f| coin.faces().contains(f)));
    }

    #[test]
    fn test_play_columns_follow_dice_order() {
        let mut rng = small_rng(9);
        let ones = fixed(1..=6, 1);
        let sixes = fixed(1..=6, 6);
        let mut game = MultiDieGame::new([&sixes, &ones]);

        game.play(&mut rng, 5).unwrap();
        let wide = game.results().unwrap();

        for row in wide.rows() {
            assert_eq!(&[6, 1], row.as_slice().unwrap());
        }
    }

    #[test]
    fn test_play_replaces_previous_results() {
        let mut rng = small_rng(10);
        let die = d6();
        let mut game = MultiDieGame::new([&die]);

        game.play(&mut rng, 10).unwrap();
        game.play(&mut rng, 3).unwrap();
        assert_eq!((3, 1), game.show_results(ResultFormat::Wide).unwrap().shape());
    }

    #[test]
    fn test_failed_play_keeps_previous_results() {
        let mut rng = small_rng(11);
        let good = d6();
        let mut bad = WeightedDie::new([1_u8]).unwrap();
        bad.set_weight(&1, 0.0).unwrap();

        let mut game = MultiDieGame::new([&good]);
        game.play(&mut rng, 4).unwrap();
        let before = game.results().cloned();

        let mut bad_game = MultiDieGame::new([&good, &bad]);
        assert_eq!(Err(Error::ZeroTotalWeight(0.0)), bad_game.play(&mut rng, 4));
        assert!(!bad_game.is_played());

        assert_eq!(before.as_ref(), game.results());
    }

    #[test]
    fn test_show_results_is_a_copy() {
        let mut rng = small_rng(12);
        let die = d6();
        let mut game = MultiDieGame::new([&die, &die]);

        game.play(&mut rng, 6).unwrap();
        let shown = game.show_results(ResultFormat::Wide).unwrap();
        game.play(&mut rng, 2).unwrap();

        assert_eq!((6, 2), shown.shape());
        assert_eq!((2, 2), game.results().unwrap().shape());
    }

    #[test]
    fn test_narrow_order() {
        let wide = WideResults::from_rows(vec![vec!['a', 'b'], vec!['c', 'd']]).unwrap();
        let narrow = wide.to_narrow();

        let cells = narrow
            .iter()
            .map(|row| (row.roll, row.die, row.outcome))
            .collect::<Vec<_>>();
        assert_eq!(
            vec![(0, 0, 'a'), (1, 0, 'c'), (0, 1, 'b'), (1, 1, 'd')],
            cells
        );
    }

    #[test]
    fn test_from_rows() {
        let wide = WideResults::from_rows(vec![vec![1, 6], vec![6, 1], vec![3, 3]]).unwrap();
        assert_eq!((3, 2), wide.shape());
        assert_eq!(Some(&6), wide.get(1, 0));
        assert_eq!(None, wide.get(3, 0));

        let empty = WideResults::<u8>::from_rows(vec![]).unwrap();
        assert_eq!((0, 0), empty.shape());

        assert!(matches!(
            WideResults::from_rows(vec![vec![1, 2], vec![3]]),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_play_zero_rolls() {
        let mut rng = small_rng(13);
        let die = d6();
        let mut game = MultiDieGame::new([&die, &die, &die]);

        game.play(&mut rng, 0).unwrap();
        assert_eq!((0, 3), game.show_results(ResultFormat::Wide).unwrap().shape());
        assert_eq!((0, 2), game.show_results(ResultFormat::Narrow).unwrap().shape());
    }

    proptest! {
        #[test]
        fn test_narrow_matches_wide(ndice in 1_usize..5, rolls in 0_usize..40, mut rng in arb_rng()) {
            let dice = (0..ndice)
                .map(|n| WeightedDie::new(0..(n as u8 + 2)).unwrap())
                .collect::<Vec<_>>();
            let mut game = MultiDieGame::new(&dice);
            game.play(&mut rng, rolls).unwrap();

            let wide = game.show_results(ResultFormat::Wide).unwrap().into_wide().unwrap();
            let narrow = game.show_results(ResultFormat::Narrow).unwrap().into_narrow().unwrap();

            prop_assert_eq!((rolls, ndice), wide.shape());
            prop_assert_eq!((rolls * ndice, 2), narrow.shape());

            let mut seen = vec![vec![false; ndice]; rolls];
            for row in narrow.iter() {
                prop_assert_eq!(Some(&row.outcome), wide.get(row.roll, row.die));
                prop_assert!(!seen[row.roll][row.die]);
                seen[row.roll][row.die] = true;
            }
            prop_assert!(seen.into_iter().flatten().all(|x| x));
        }
    }
}
