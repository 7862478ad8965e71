//! Structured summary of a procurement notice and its display grouping.
//!
//! Field names follow the JSON the model is asked to produce (camelCase,
//! Portuguese). Every field is defaulted: the model returns empty strings or
//! arrays for information it cannot find, sometimes `null`, and sometimes
//! omits them entirely.

use serde::{Deserialize, Deserializer, Serialize};

/// `null` reads as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// String list where both the list and its entries may be `null`; null entries are dropped.
fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Option::<Vec<Option<String>>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(entries.into_iter().flatten().collect())
}

/// The contracting body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Licitante {
    #[serde(deserialize_with = "null_as_default")]
    pub nome: String,
    #[serde(deserialize_with = "null_as_default")]
    pub cnpj: String,
    #[serde(deserialize_with = "null_as_default")]
    pub endereco: String,
    #[serde(deserialize_with = "null_as_default")]
    pub telefone: String,
    #[serde(deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(deserialize_with = "null_as_default")]
    pub responsavel: String,
}

/// One line item of the notice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemLicitado {
    #[serde(deserialize_with = "null_as_default")]
    pub item: String,
    #[serde(deserialize_with = "null_as_default")]
    pub descricao: String,
    #[serde(deserialize_with = "null_as_default")]
    pub quantidade: String,
    #[serde(deserialize_with = "null_as_default")]
    pub unidade: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SummaryData {
    #[serde(deserialize_with = "null_as_default")]
    pub licitante: Licitante,
    #[serde(deserialize_with = "null_as_default")]
    pub objeto_licitacao: String,
    #[serde(deserialize_with = "null_as_default")]
    pub tipo_disputa: String,
    #[serde(deserialize_with = "null_as_default")]
    pub portal: String,
    #[serde(deserialize_with = "null_as_default")]
    pub numero_processo: String,
    #[serde(deserialize_with = "null_as_default")]
    pub data_abertura: String,
    #[serde(deserialize_with = "null_as_default")]
    pub data_disputa: String,
    #[serde(deserialize_with = "null_as_default")]
    pub data_entrega: String,
    #[serde(deserialize_with = "null_as_default")]
    pub data_pagamento: String,
    #[serde(deserialize_with = "null_as_default")]
    pub validade_proposta: String,
    #[serde(deserialize_with = "string_list")]
    pub requisitos_habilitacao: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub criterio_julgamento: String,
    #[serde(deserialize_with = "null_as_default")]
    pub itens_licitados: Vec<ItemLicitado>,
    #[serde(deserialize_with = "string_list")]
    pub outros_dados: Vec<String>,
}

/// A titled block of the rendered summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummarySection {
    pub title: &'static str,
    pub body: SectionBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "content", rename_all = "lowercase")]
pub enum SectionBody {
    /// Label/value pairs; empty values are left out.
    Fields(Vec<Field>),
    /// Bullet list.
    List(Vec<String>),
    /// Item table.
    Table(Vec<ItemLicitado>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub label: &'static str,
    pub value: String,
}

fn fields(pairs: &[(&'static str, &str)]) -> Vec<Field> {
    pairs
        .iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(label, value)| Field {
            label: *label,
            value: value.to_string(),
        })
        .collect()
}

impl SummaryData {
    /// Group the summary the way it is displayed.
    ///
    /// The three field sections are always present (possibly empty); list and
    /// table sections only when they have entries.
    pub fn sections(&self) -> Vec<SummarySection> {
        let l = &self.licitante;
        let mut sections = vec![
            SummarySection {
                title: "Dados do Órgão Licitante",
                body: SectionBody::Fields(fields(&[
                    ("Nome", l.nome.as_str()),
                    ("CNPJ", l.cnpj.as_str()),
                    ("Endereço", l.endereco.as_str()),
                    ("Telefone", l.telefone.as_str()),
                    ("Email", l.email.as_str()),
                    ("Responsável", l.responsavel.as_str()),
                ])),
            },
            SummarySection {
                title: "Informações Gerais",
                body: SectionBody::Fields(fields(&[
                    ("Objeto da Licitação", self.objeto_licitacao.as_str()),
                    ("Tipo de Disputa", self.tipo_disputa.as_str()),
                    ("Portal", self.portal.as_str()),
                    ("Número do Processo", self.numero_processo.as_str()),
                    ("Critério de Julgamento", self.criterio_julgamento.as_str()),
                ])),
            },
            SummarySection {
                title: "Datas Principais",
                body: SectionBody::Fields(fields(&[
                    ("Abertura", self.data_abertura.as_str()),
                    ("Disputa", self.data_disputa.as_str()),
                    ("Entrega", self.data_entrega.as_str()),
                    ("Pagamento", self.data_pagamento.as_str()),
                    ("Validade da Proposta", self.validade_proposta.as_str()),
                ])),
            },
        ];

        if !self.requisitos_habilitacao.is_empty() {
            sections.push(SummarySection {
                title: "Requisitos de Habilitação",
                body: SectionBody::List(self.requisitos_habilitacao.clone()),
            });
        }
        if !self.itens_licitados.is_empty() {
            sections.push(SummarySection {
                title: "Principais Itens Licitados",
                body: SectionBody::Table(self.itens_licitados.clone()),
            });
        }
        if !self.outros_dados.is_empty() {
            sections.push(SummarySection {
                title: "Outros Dados Relevantes",
                body: SectionBody::List(self.outros_dados.clone()),
            });
        }

        sections
    }

    /// Markdown export of the summary.
    pub fn to_markdown(&self) -> String {
        let mut out = String::from("# Resumo do Edital\n");

        for section in self.sections() {
            out.push_str(&format!("\n## {}\n\n", section.title));
            match &section.body {
                SectionBody::Fields(fields) => {
                    for f in fields {
                        out.push_str(&format!("- **{}:** {}\n", f.label, f.value));
                    }
                }
                SectionBody::List(items) => {
                    for item in items {
                        out.push_str(&format!("- {}\n", item));
                    }
                }
                SectionBody::Table(items) => {
                    out.push_str("| Item | Descrição | Qtd. | Un. |\n");
                    out.push_str("|---|---|---|---|\n");
                    for i in items {
                        out.push_str(&format!(
                            "| {} | {} | {} | {} |\n",
                            cell(&i.item),
                            cell(&i.descricao),
                            cell(&i.quantidade),
                            cell(&i.unidade)
                        ));
                    }
                }
            }
        }

        out
    }
}

fn cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}
