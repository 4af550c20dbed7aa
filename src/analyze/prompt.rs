// src/analyze/prompt.rs

const PROCEDURE_KINDS: [&str; 6] = [
    "Convocatorias de oposiciones",
    "Concursos de méritos",
    "Creación de listas de reserva o bolsas de trabajo",
    "Listados de admitidos o excluidos",
    "Resoluciones de nombramientos",
    "Cualquier trámite vinculado a empleo público",
];

/// Instruction text sent to the model. Plain output is requested because the
/// reply is forwarded verbatim to chat and email.
pub fn build_prompt(source_name: &str, topics: &[String], text: &str) -> String {
    let source_info = if source_name.trim().is_empty() {
        String::new()
    } else {
        format!(" de {source_name}")
    };
    let kinds = PROCEDURE_KINDS
        .iter()
        .map(|k| format!("- {k}"))
        .collect::<Vec<_>>()
        .join("\n");
    let topics = topics.join(", ");

    format!(
        "Analiza el contenido{source_info} y determina si se menciona alguna convocatoria de empleo público \
o procesos relacionados con la contratación o selección de personal. Presta atención a referencias como:

{kinds}

Indica si alguna de estas categorías afecta a las siguientes profesiones:

{topics}

Instrucciones para el formato de respuesta:
- Usa un estilo claro y fácil de leer en un chat
- Evita HTML, Markdown o formatos de código
- Resalta la información relevante con símbolos o emojis
- Cada registro debe contener, en este orden:
    1. Profesión o categoría afectada (resaltar si coincide con las profesiones indicadas)
    2. Lugar (isla, localidad, ayuntamiento o empresa, si se menciona)
    3. Tipo de información detectada (convocatoria, bases, listado de admitidos, nombramientos, etc.)

Texto a analizar:
{text}
"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_source_topics_and_text() {
        let topics = vec!["programador".to_string(), "médico geriatra".to_string()];
        let p = build_prompt("BOC", &topics, "ANUNCIO 1234");
        assert!(p.starts_with("Analiza el contenido de BOC "));
        assert!(p.contains("programador, médico geriatra"));
        assert!(p.contains("- Concursos de méritos"));
        assert!(p.trim_end().ends_with("ANUNCIO 1234"));
    }

    #[test]
    fn blank_source_name_is_omitted() {
        let p = build_prompt("  ", &[], "x");
        assert!(p.starts_with("Analiza el contenido y determina"));
    }
}
