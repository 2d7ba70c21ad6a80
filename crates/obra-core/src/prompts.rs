//! Prompt templates for the two model-backed stages.
//!
//! Each template carries exactly one marker that is replaced verbatim
//! with the stage payload. Nothing is escaped, so a payload must not
//! contain the marker of the template it is inserted into.
//!
//! The templates are written in Spanish because the source documents
//! and the output field names are Spanish.

/// A prompt template with a single substitution marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate {
    /// Template body
    pub text: &'static str,
    /// Token replaced by the payload
    pub marker: &'static str,
}

impl PromptTemplate {
    /// Substitute the payload for the marker.
    pub fn build(&self, payload: &str) -> String {
        self.text.replace(self.marker, payload)
    }
}

/// Documents → contract record. Payload: joined document text.
pub const EXTRACTION_PROMPT: PromptTemplate = PromptTemplate {
    text: EXTRACTION_TEMPLATE,
    marker: "[[CONTENIDO]]",
};

/// Contract record → cost comparison. Payload: the contract JSON text.
pub const ANALYSIS_PROMPT: PromptTemplate = PromptTemplate {
    text: ANALYSIS_TEMPLATE,
    marker: "[[JSON_DATA]]",
};

const EXTRACTION_TEMPLATE: &str = r#"Analiza el siguiente texto y devuelve SOLO un JSON con este formato exacto:

{
  "proyecto": {
    "nombre": "",
    "lugar": "",
    "contrato_no": "",
    "contratista": "",
    "monto_total_contrato_MXN": 0.00,
    "fecha_inicio_programada": "",
    "fecha_termino_programada": "",
    "objetivo": "",
    "alcance_tecnico": [],
    "observaciones": []
  },
  "partidas": [
    { "descripcion": "", "unidad": "", "cantidad": 0.00, "precio": 0 }
  ]
}

Detalles para llenar:
- nombre, lugar, contrato_no, contratista, monto_total_contrato_MXN (incluye IVA si aplica), fechas: del contrato
- objetivo: propósito principal de la obra
- alcance_tecnico: principales actividades o conceptos técnicos
- observaciones: notas relevantes del expediente (normas, control de calidad, condiciones, tipo de contrato, materiales)
No inventes nada; solo usa lo que esté realmente en los documentos.

Contenido:
[[CONTENIDO]]"#;

const ANALYSIS_TEMPLATE: &str = r#"Analiza el siguiente JSON y devuelve **solo** un nuevo JSON con el formato EXACTO mostrado abajo.
La información de resumen_general debe estar COMPLETA; no la dejes en 0.
Los precios que calcules deben estar en MXN y ser reales o muy cercanos a la realidad.

=== FORMATO DE SALIDA ===
{
  "resumen_general": {
    "costo_en_contrato": 0,
    "precio_estimado_mercado": 0,
    "diferencia_total": 0,
    "diferencia_porcentaje": 0.0,
    "credibilidad": 0
  },
  "partidas": [
    {
      "concepto": "",
      "unidad": "",
      "cantidad": 0,
      "costo_en_contrato": 0,
      "precio_estimado_mercado": 0,
      "diferencia": 0,
      "diferencia_%": 0.0,
      "observaciones": ""
    }
  ],
  "alertas": [],
  "recomendaciones": []
}

=== INSTRUCCIONES ===
- Usa TODA la información del JSON de entrada. No inventes ni elimines nada.
- Los precios, unidades y cantidades vienen en el JSON de entrada; úsalos.
- Si el precio del contrato es 0, estima el precio de mercado según el concepto con un valor promedio real en México.
- Calcula:
  - costo_en_contrato = suma de (costo_en_contrato * cantidad)
  - precio_estimado_mercado = suma de (precio_estimado_mercado * cantidad)
  - diferencia_total = mercado - contrato
  - diferencia_porcentaje = (diferencia_total / contrato) * 100 si contrato > 0, o 0 si no
  - credibilidad = 100 si los precios son similares, menor si hay diferencias grandes
- En observaciones: explica de dónde salió el dato.
- En alertas: señala errores, vacíos o poca transparencia.
- En recomendaciones: sugiere qué hacer.
monto_total_contrato_MXN es costo_en_contrato.

- Devuelve solo el JSON, con 2 espacios de sangría y sin texto extra.

=== ENTRADA ===
[[JSON_DATA]]"#;
