//! System prompt texts: a shared base block plus one instruction block per
//! document type. Built-in texts can be replaced from a directory holding
//! `base_system.txt` and `<type-code>.txt`.

use anyhow::{Context, Result};
use std::path::Path;

use crate::types::DocumentType;

const BASE_SYSTEM: &str = "\
Du er en erfaren norsk forretningsskribent for Kulde- & Varmepumpeteknikk AS (KVTAS), \
et firma som leverer, installerer og vedlikeholder varmepumper, kjøleanlegg og ventilasjon.
Skriv alltid på korrekt norsk bokmål, i en profesjonell, vennlig og presis tone.
Bruk kun opplysninger du har fått oppgitt eller som står i kunnskapsbasen. Ikke finn opp priser, \
produktnavn eller avtalevilkår.
Formater teksten med enkel markdown: # for overskrifter, - for punktlister, **fet** og *kursiv*.
Ikke ta med hilsen eller signatur til slutt; den legges til automatisk.";

const OFFER: &str = "\
Dokumenttype: Tilbud.
Skriv et tilbud til kunden. Start med en kort innledning, beskriv produktet eller tjenesten, \
hva som inngår i leveransen og installasjonen, og oppgi prisene som er gitt. \
Avslutt med gyldighet for tilbudet og hvordan kunden kan akseptere det.";

const LETTER: &str = "\
Dokumenttype: Brev.
Skriv et formelt forretningsbrev til mottakeren. Hold det konsist, med en tydelig innledning, \
hoveddel og avslutning.";

const NOTE: &str = "\
Dokumenttype: Notat.
Skriv et internt notat. Bruk korte avsnitt og punktlister der det passer, og oppsummer \
viktige beslutninger og oppfølgingspunkter.";

const REBRANDING: &str = "\
Dokumenttype: Omprofilering.
Du får et vedlagt tilbud eller dokument fra en annen leverandør. Skriv innholdet om til et \
tilbud fra KVTAS med vår profil og tone. Behold fakta som produkter, mengder og tekniske data, \
men bruk prisene som er oppgitt for KVTAS.";

const LETTER_REPLY: &str = "\
Dokumenttype: Svar på brev.
Du får et vedlagt brev. Skriv et svar som tar stilling til hvert punkt i brevet, \
høflig og saklig.";

const SERVICE_AGREEMENT: &str = "\
Dokumenttype: Serviceavtale.
Skriv en serviceavtale for kundens anlegg. Beskriv hvilket anlegg avtalen gjelder, \
serviceintervall, hva som inngår i hvert servicebesøk, pris og avtaleperiode.";

#[derive(Debug, Clone)]
pub struct PromptLibrary {
    base: String,
    /// Indexed by [`slot`].
    instructions: [String; 6],
}

fn slot(document_type: DocumentType) -> usize {
    match document_type {
        DocumentType::Offer => 0,
        DocumentType::Letter => 1,
        DocumentType::Note => 2,
        DocumentType::Rebranding => 3,
        DocumentType::LetterReply => 4,
        DocumentType::ServiceAgreement => 5,
    }
}

impl PromptLibrary {
    pub fn builtin() -> Self {
        Self {
            base: BASE_SYSTEM.to_string(),
            instructions: [
                OFFER.to_string(),
                LETTER.to_string(),
                NOTE.to_string(),
                REBRANDING.to_string(),
                LETTER_REPLY.to_string(),
                SERVICE_AGREEMENT.to_string(),
            ],
        }
    }

    /// Load every prompt from `dir`. A missing file is a configuration
    /// error: each document type must resolve before the service starts.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let read = |name: &str| -> Result<String> {
            let path = dir.join(format!("{}.txt", name));
            std::fs::read_to_string(&path)
                .with_context(|| format!("Missing prompt file: {}", path.display()))
        };

        let mut library = Self::builtin();
        library.base = read("base_system")?;
        for document_type in DocumentType::ALL {
            library.instructions[slot(document_type)] = read(document_type.code())?;
        }
        tracing::info!(dir = %dir.display(), "Loaded prompt overrides");
        Ok(library)
    }

    pub fn load(override_dir: Option<&Path>) -> Result<Self> {
        match override_dir {
            Some(dir) => Self::from_dir(dir),
            None => Ok(Self::builtin()),
        }
    }

    pub fn instruction(&self, document_type: DocumentType) -> &str {
        &self.instructions[slot(document_type)]
    }

    pub fn system_prompt(&self, document_type: DocumentType) -> String {
        format!("{}\n\n{}", self.base.trim_end(), self.instruction(document_type).trim())
    }
}
