//! Classification prompt assembly.
//!
//! The known pain taxonomy is an explicit input: the orchestrator reads the
//! current distinct labels from the store and passes them in here, so the
//! label vocabulary self-reinforces across calls without hidden state.

const SYSTEM_PROMPT: &str = "Eres un analista experto en ventas B2B. Recibirás el transcrito de una reunión \
comercial y deberás evaluar al cliente usando criterios cuantitativos y cualitativos. \
Tu salida debe ser un JSON estricto y válido. Si no hay información suficiente en el \
transcrito, devuelve null o [] según corresponda.

Tus evaluaciones deben ser consistentes y seguir estas reglas:
- Usa escalas y categorías definidas.
- No inventes información no presente en el texto.
- Sé conservador al asignar probabilidades.";

const USER_PROMPT: &str = "Analiza el siguiente transcrito y genera una clasificación completa.

TRANSCRITO:
\"\"
{TRANSCRITO_AQUI}
\"\"

Devuelve exclusivamente un JSON con el siguiente esquema:

{
  \"sentiment\": integer (-2 a 2),
  \"urgency\": integer (0 a 3),
  \"budget_tier\": \"Low\" | \"Medium\" | \"High\" | null,
  \"buyer_role\": \"Decisor\" | \"Influenciador\" | \"Usuario\" | null,
  \"use_case\": string | null,
  \"origin\": string | null,
  \"automatization\": boolean | null,
  \"pains\": [strings],
  \"objections\": [strings],
  \"competitors\": [strings],
  \"risks\": [strings],
  \"next_step_clarity\": integer (0 a 3),
  \"fit_score\": float (0 a 1),
  \"close_probability\": float (0 a 1),
  \"summary\": string
}

Donde:
- \"fit_score\" evalúa cuán bien el producto resuelve el problema del cliente.
- \"close_probability\" evalúa la probabilidad de cierre considerando todas las señales.
- \"next_step_clarity\" indica si quedó acción definida.
- \"origin\" es el canal por el que llegó el cliente (ej. Referido, Web, Evento).
- \"automatization\" indica si el cliente busca automatizar su operación.";

/// Build the full prompt for one transcript.
///
/// `known_pains` is the current distinct pain-label taxonomy; when present,
/// the model is asked to reuse those labels before inventing new ones.
pub fn build_prompt(transcript: &str, known_pains: &[String]) -> String {
    let parts: Vec<&str> = USER_PROMPT.split("{TRANSCRITO_AQUI}").collect();
    let mut prompt = format!(
        "{SYSTEM_PROMPT}\n\n{}{transcript}{}",
        parts[0],
        parts.get(1).copied().unwrap_or_default()
    );

    if !known_pains.is_empty() {
        prompt.push_str("\n\nCATEGORÍAS DE DOLOR YA CONOCIDAS:\n");
        for pain in known_pains {
            prompt.push_str("- ");
            prompt.push_str(pain);
            prompt.push('\n');
        }
        prompt.push_str(
            "Reutiliza estas etiquetas en \"pains\" cuando apliquen; crea una nueva solo si ninguna corresponde.",
        );
    }

    prompt
}
