//! Gemini `responseSchema` for [`SummaryData`](crate::SummaryData).

use serde_json::{json, Value};

fn string(description: &str) -> Value {
    json!({ "type": "STRING", "description": description })
}

fn string_list(description: &str) -> Value {
    json!({ "type": "ARRAY", "items": { "type": "STRING" }, "description": description })
}

/// Full summary schema, including the item table.
pub fn summary_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "licitante": {
                "type": "OBJECT",
                "properties": {
                    "nome": string("Nome do órgão licitante."),
                    "cnpj": string("CNPJ do órgão licitante."),
                    "endereco": string("Endereço completo."),
                    "telefone": string("Telefone de contato."),
                    "email": string("Email de contato."),
                    "responsavel": string("Nome do responsável ou pregoeiro."),
                },
            },
            "objetoLicitacao": string("Descrição completa do objeto da licitação."),
            "tipoDisputa": string("Modalidade da licitação (ex: Pregão Eletrônico)."),
            "portal": string("Portal onde ocorre a licitação (ex: Comprasnet)."),
            "numeroProcesso": string("Número do processo ou da licitação."),
            "dataAbertura": string("Data e hora de abertura das propostas."),
            "dataDisputa": string("Data e hora do início da disputa."),
            "dataEntrega": string("Prazo ou data para entrega do objeto."),
            "dataPagamento": string("Condições ou prazo para pagamento."),
            "validadeProposta": string("Prazo de validade da proposta."),
            "requisitosHabilitacao": string_list(
                "Lista dos principais documentos e requisitos para habilitação."
            ),
            "criterioJulgamento": string("Critério de julgamento (ex: Menor Preço)."),
            "itensLicitados": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "item": string("Número do item."),
                        "descricao": string("Descrição resumida do item."),
                        "quantidade": string("Quantidade do item."),
                        "unidade": string("Unidade de medida do item."),
                    },
                },
            },
            "outrosDados": string_list(
                "Lista de outros dados relevantes como garantias, penalidades, local de execução, etc."
            ),
        },
    })
}

/// Schema sent with summarization requests.
///
/// Same as [`summary_schema`] without `itensLicitados`; item lists are never
/// requested from the model.
pub fn summary_schema_for_request() -> Value {
    let mut schema = summary_schema();
    if let Some(props) = schema["properties"].as_object_mut() {
        props.remove("itensLicitados");
    }
    schema
}
