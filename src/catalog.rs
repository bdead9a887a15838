use std::fmt;
use std::str::FromStr;

use anyhow::{Error, anyhow};

/// Difficulty tier. Doubles as the pack-partitioning key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    Facil,
    Medio,
    Dificil,
}

impl Tier {
    pub(crate) const ALL: [Tier; 3] = [Tier::Facil, Tier::Medio, Tier::Dificil];

    pub(crate) fn id(self) -> &'static str {
        match self {
            Self::Facil => "facil",
            Self::Medio => "medio",
            Self::Dificil => "dificil",
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Facil => "Fácil",
            Self::Medio => "Medio",
            Self::Dificil => "Difícil",
        }
    }

    pub(crate) fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tier| tier.id() == id)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "facil" | "easy" => Ok(Self::Facil),
            "medio" | "medium" => Ok(Self::Medio),
            "dificil" | "hard" => Ok(Self::Dificil),
            _ => Err(anyhow!(
                "unknown pack '{raw}' (expected facil, medio or dificil)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GameMode {
    Silaba,
    Palabra,
    Oracion,
}

impl GameMode {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Silaba => "Sílabas",
            Self::Palabra => "Palabras",
            Self::Oracion => "Oraciones",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Exercise {
    pub(crate) id: &'static str,
    pub(crate) island: u8,
    pub(crate) mode: GameMode,
    pub(crate) target: &'static str,
    pub(crate) difficulty: Tier,
    pub(crate) required_audios: &'static [&'static str],
}

/// Played on every exercise regardless of tier.
pub(crate) const SHARED_AUDIOS: &[&str] = &[
    "/audio/countdown_3.mp3",
    "/audio/countdown_2.mp3",
    "/audio/countdown_1.mp3",
    "/audio/countdown_go.mp3",
    "/audio/success.mp3",
];

pub(crate) fn exercises() -> &'static [Exercise] {
    EXERCISES
}

const fn exercise(
    id: &'static str,
    island: u8,
    mode: GameMode,
    target: &'static str,
    difficulty: Tier,
    required_audios: &'static [&'static str],
) -> Exercise {
    Exercise {
        id,
        island,
        mode,
        target,
        difficulty,
        required_audios,
    }
}

use self::GameMode::{Oracion, Palabra, Silaba};
use self::Tier::{Dificil, Facil, Medio};

static EXERCISES: &[Exercise] = &[
    // Island 1: syllables
    exercise("level_m", 1, Silaba, "Manzana", Facil, &[
        "/audio/inst_manzana_m.mp3",
        "/audio/syl_man.mp3",
        "/audio/syl_san.mp3",
        "/audio/countdown_3.mp3",
        "/audio/countdown_2.mp3",
        "/audio/countdown_1.mp3",
        "/audio/countdown_go.mp3",
        "/audio/success.mp3",
    ]),
    exercise("level_p", 1, Silaba, "Pato", Facil, &[
        "/audio/inst_pato.mp3",
        "/audio/syl_pa.mp3",
        "/audio/syl_ta.mp3",
        "/audio/success.mp3",
    ]),
    exercise("level_l", 1, Silaba, "Lupa", Facil, &[
        "/audio/inst_lupa.mp3",
        "/audio/syl_lu.mp3",
        "/audio/syl_ul.mp3",
        "/audio/success.mp3",
    ]),
    exercise("level_s", 1, Silaba, "Sapo", Facil, &[
        "/audio/inst_sapo.mp3",
        "/audio/syl_sa.mp3",
        "/audio/syl_za.mp3",
        "/audio/success.mp3",
    ]),
    exercise("level_t", 1, Silaba, "Toro", Medio, &[
        "/audio/inst_toro.mp3",
        "/audio/syl_to.mp3",
        "/audio/syl_ro.mp3",
        "/audio/success.mp3",
    ]),
    exercise("level_n", 1, Silaba, "Nido", Medio, &[
        "/audio/inst_nido.mp3",
        "/audio/syl_ni.mp3",
        "/audio/syl_mi.mp3",
        "/audio/success.mp3",
    ]),
    exercise("level_d", 1, Silaba, "Dedo", Medio, &[
        "/audio/inst_dedo.mp3",
        "/audio/syl_de.mp3",
        "/audio/syl_te.mp3",
        "/audio/success.mp3",
    ]),
    exercise("level_j", 1, Silaba, "Jarra", Medio, &[
        "/audio/inst_jarra.mp3",
        "/audio/syl_ja.mp3",
        "/audio/syl_ga.mp3",
        "/audio/success.mp3",
    ]),
    exercise("level_m2", 1, Silaba, "Miel", Dificil, &[
        "/audio/inst_miel.mp3",
        "/audio/syl_miel.mp3",
        "/audio/syl_piel.mp3",
        "/audio/success.mp3",
    ]),
    exercise("level_s2", 1, Silaba, "Cisne", Dificil, &[
        "/audio/inst_cisne.mp3",
        "/audio/syl_cis.mp3",
        "/audio/syl_sis.mp3",
        "/audio/success.mp3",
    ]),
    // Island 2: whole words
    exercise("word_mama", 2, Palabra, "Mi ___ me ama", Facil, &[
        "/audio/inst_word_mama.mp3",
        "/audio/word_mama.mp3",
        "/audio/word_papa.mp3",
        "/audio/success.mp3",
    ]),
    exercise("word_papa", 2, Palabra, "___ lima la pala", Facil, &[
        "/audio/inst_word_papa.mp3",
        "/audio/word_papa.mp3",
        "/audio/word_mama.mp3",
        "/audio/success.mp3",
    ]),
    exercise("word_mimo", 2, Palabra, "El gato es ___", Facil, &[
        "/audio/inst_word_mimo.mp3",
        "/audio/word_mimo.mp3",
        "/audio/success.mp3",
    ]),
    exercise("word_pala", 2, Palabra, "La ___ es de papá", Facil, &[
        "/audio/inst_word_pala.mp3",
        "/audio/word_pala.mp3",
        "/audio/success.mp3",
    ]),
    exercise("word_mesa", 2, Palabra, "La ___ es bonita", Medio, &[
        "/audio/inst_word_mesa.mp3",
        "/audio/word_mesa.mp3",
        "/audio/success.mp3",
    ]),
    exercise("word_sopa", 2, Palabra, "La ___ está caliente", Medio, &[
        "/audio/inst_word_sopa.mp3",
        "/audio/word_sopa.mp3",
        "/audio/success.mp3",
    ]),
    exercise("word_luna", 2, Palabra, "La ___ es redonda", Medio, &[
        "/audio/inst_word_luna.mp3",
        "/audio/word_luna.mp3",
        "/audio/success.mp3",
    ]),
    exercise("word_dado", 2, Palabra, "El ___ tiene puntos", Medio, &[
        "/audio/inst_word_dado.mp3",
        "/audio/word_dado.mp3",
        "/audio/success.mp3",
    ]),
    exercise("word_tela", 2, Palabra, "La ___ es suave", Dificil, &[
        "/audio/inst_word_tela.mp3",
        "/audio/word_tela.mp3",
        "/audio/success.mp3",
    ]),
    exercise("word_nido", 2, Palabra, "El pájaro tiene ___", Dificil, &[
        "/audio/inst_word_nido.mp3",
        "/audio/word_nido.mp3",
        "/audio/success.mp3",
    ]),
    // Island 3: complete the sentence
    exercise("sent_01", 3, Oracion, "Amo a mi ___", Facil, &[
        "/audio/inst_sent_01.mp3",
        "/audio/word_mama.mp3",
        "/audio/success.mp3",
    ]),
    exercise("sent_02", 3, Oracion, "Mi mamá me ___", Facil, &[
        "/audio/inst_sent_02.mp3",
        "/audio/word_ama.mp3",
        "/audio/success.mp3",
    ]),
    exercise("sent_03", 3, Oracion, "Papá ___ la pala", Facil, &[
        "/audio/inst_sent_03.mp3",
        "/audio/word_lima.mp3",
        "/audio/success.mp3",
    ]),
    exercise("sent_04", 3, Oracion, "El ___ es bonito", Medio, &[
        "/audio/inst_sent_04.mp3",
        "/audio/word_nido.mp3",
        "/audio/success.mp3",
    ]),
    exercise("sent_05", 3, Oracion, "La luna ___ en el cielo", Medio, &[
        "/audio/inst_sent_05.mp3",
        "/audio/word_brilla.mp3",
        "/audio/success.mp3",
    ]),
    exercise("sent_06", 3, Oracion, "Mi ___ toma sopa", Medio, &[
        "/audio/inst_sent_06.mp3",
        "/audio/word_mama.mp3",
        "/audio/success.mp3",
    ]),
    exercise("sent_07", 3, Oracion, "El pato ___ en el lago", Medio, &[
        "/audio/inst_sent_07.mp3",
        "/audio/word_nada.mp3",
        "/audio/success.mp3",
    ]),
    exercise("sent_08", 3, Oracion, "La mesa ___ de madera", Dificil, &[
        "/audio/inst_sent_08.mp3",
        "/audio/word_es.mp3",
        "/audio/success.mp3",
    ]),
    exercise("sent_09", 3, Oracion, "Mi ___ lee el libro", Dificil, &[
        "/audio/inst_sent_09.mp3",
        "/audio/word_papa.mp3",
        "/audio/success.mp3",
    ]),
    exercise("sent_10", 3, Oracion, "El sapo ___ en la laguna", Dificil, &[
        "/audio/inst_sent_10.mp3",
        "/audio/word_salta.mp3",
        "/audio/success.mp3",
    ]),
];
